//! Single-event ICS parsing using the icalendar crate's parser.

use chrono::{DateTime, Utc};
use icalendar::{
    CalendarDateTime, DatePerhapsTime,
    parser::{read_calendar, unfold},
};

use crate::models::{CustomProperty, Event, EventTime, TimezoneDefinition, synthesize_uid};

/// Cheap pre-check before handing a body to the parser.
pub fn looks_like_calendar(body: &str) -> bool {
    body.contains("BEGIN:VCALENDAR")
}

/// Parse the first VEVENT of a calendar document into an [`Event`].
///
/// Returns `None` unless the body is a calendar with a VEVENT carrying a
/// usable DTSTART. A missing UID is synthesized from `source_url`.
/// Description is left empty; the acquirer fills it from the event page.
pub fn parse_event(content: &str, source_url: &str, fetched_at: DateTime<Utc>) -> Option<Event> {
    if !looks_like_calendar(content) {
        return None;
    }

    let unfolded = unfold(content);
    let calendar = read_calendar(&unfolded).ok()?;
    let mut vevents = calendar.components.iter().filter(|c| c.name == "VEVENT");
    let vevent = vevents.next()?;
    let ignored = vevents.count();
    if ignored > 0 {
        log::debug!("{source_url}: ignoring {ignored} additional VEVENT(s)");
    }

    let start = to_event_time(DatePerhapsTime::try_from(vevent.find_prop("DTSTART")?).ok()?);
    let end = vevent
        .find_prop("DTEND")
        .and_then(|p| DatePerhapsTime::try_from(p).ok())
        .map(to_event_time);

    let uid = vevent
        .find_prop("UID")
        .map(|p| p.val.to_string())
        .filter(|uid| !uid.trim().is_empty())
        .unwrap_or_else(|| synthesize_uid(source_url));
    let summary = vevent
        .find_prop("SUMMARY")
        .map(|p| unescape_text(p.val.as_ref()))
        .unwrap_or_else(|| "Untitled".to_string());
    let location = vevent
        .find_prop("LOCATION")
        .map(|p| unescape_text(p.val.as_ref()))
        .filter(|l| !l.is_empty());

    let custom_properties: Vec<CustomProperty> = vevent
        .properties
        .iter()
        .filter(|p| p.name.as_ref().starts_with("X-"))
        .map(|p| CustomProperty {
            name: p.name.to_string(),
            params: p
                .params
                .iter()
                .map(|param| {
                    let value = param.val.as_ref().map(|v| v.to_string()).unwrap_or_default();
                    (param.key.to_string(), value)
                })
                .collect(),
            value: p.val.to_string(),
        })
        .collect();

    let used_tzids: Vec<&str> = std::iter::once(&start)
        .chain(end.as_ref())
        .filter_map(EventTime::tzid)
        .collect();
    let timezones = extract_timezones(&unfolded)
        .into_iter()
        .filter(|tz| used_tzids.contains(&tz.tzid.as_str()))
        .collect();

    Some(Event {
        uid,
        summary,
        start,
        end,
        location,
        source_url: source_url.to_string(),
        description: String::new(),
        fetched_at,
        custom_properties,
        timezones,
    })
}

/// Reverse RFC 5545 TEXT escaping.
pub fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn to_event_time(dpt: DatePerhapsTime) -> EventTime {
    match dpt {
        DatePerhapsTime::Date(d) => EventTime::Date(d),
        DatePerhapsTime::DateTime(cal_dt) => match cal_dt {
            CalendarDateTime::Utc(dt) => EventTime::DateTimeUtc(dt),
            CalendarDateTime::Floating(naive) => EventTime::DateTimeFloating(naive),
            CalendarDateTime::WithTimezone { date_time, tzid } => EventTime::DateTimeZoned {
                datetime: date_time,
                tzid,
            },
        },
    }
}

/// Collect VTIMEZONE blocks verbatim from unfolded calendar text.
fn extract_timezones(unfolded: &str) -> Vec<TimezoneDefinition> {
    let mut found = Vec::new();
    let mut current: Option<Vec<String>> = None;

    for line in unfolded.lines().map(str::trim_end) {
        if line == "BEGIN:VTIMEZONE" {
            current = Some(vec![line.to_string()]);
            continue;
        }
        let Some(lines) = current.as_mut() else {
            continue;
        };
        lines.push(line.to_string());
        if line == "END:VTIMEZONE" {
            let lines = current.take().unwrap_or_default();
            let tzid = lines
                .iter()
                .find_map(|l| l.strip_prefix("TZID:"))
                .map(str::to_string);
            if let Some(tzid) = tzid {
                found.push(TimezoneDefinition { tzid, lines });
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone};

    use super::*;

    const ZONED: &str = "BEGIN:VCALENDAR\r
VERSION:2.0\r
PRODID:-//Squarespace Inc//Squarespace Event//EN\r
BEGIN:VTIMEZONE\r
TZID:America/Indiana/Indianapolis\r
BEGIN:DAYLIGHT\r
TZOFFSETFROM:-0500\r
TZOFFSETTO:-0400\r
DTSTART:20070311T020000\r
END:DAYLIGHT\r
END:VTIMEZONE\r
BEGIN:VEVENT\r
UID:fair-2025@example.com\r
DTSTAMP:20250601T120000Z\r
DTSTART;TZID=America/Indiana/Indianapolis:20250704T180000\r
DTEND;TZID=America/Indiana/Indianapolis:20250704T210000\r
SUMMARY:Summer Fair\r
LOCATION:Courthouse Square\r
X-APPLE-TRAVEL-ADVISORY-BEHAVIOR:AUTOMATIC\r
END:VEVENT\r
END:VCALENDAR\r
";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn parses_zoned_event_with_timezone_block() {
        let event = parse_event(ZONED, "https://example.com/events/fair", now()).unwrap();

        assert_eq!(event.uid, "fair-2025@example.com");
        assert_eq!(event.summary, "Summer Fair");
        assert_eq!(event.location.as_deref(), Some("Courthouse Square"));
        assert_eq!(event.start.tzid(), Some("America/Indiana/Indianapolis"));
        assert!(event.end.is_some());
        assert_eq!(event.timezones.len(), 1);
        assert_eq!(event.timezones[0].lines.first().unwrap(), "BEGIN:VTIMEZONE");
        assert_eq!(event.timezones[0].lines.last().unwrap(), "END:VTIMEZONE");
        assert_eq!(
            event.custom_properties,
            vec![CustomProperty::new("X-APPLE-TRAVEL-ADVISORY-BEHAVIOR", "AUTOMATIC")]
        );
    }

    #[test]
    fn keeps_repeated_and_parameterized_x_properties() {
        let ics = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nBEGIN:VEVENT\r\nUID:tags@example.com\r\nDTSTART:20250704T220000Z\r\nX-TAG:one\r\nX-TAG:two\r\nX-ALT-DESC;FMTTYPE=text/html:<b>hi</b>\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
        let event = parse_event(ics, "https://x.test/e", now()).unwrap();

        assert_eq!(
            event.custom_properties,
            vec![
                CustomProperty::new("X-TAG", "one"),
                CustomProperty::new("X-TAG", "two"),
                CustomProperty::new("X-ALT-DESC", "<b>hi</b>").with_param("FMTTYPE", "text/html"),
            ]
        );
    }

    #[test]
    fn all_day_event_without_uid_gets_synthesized_uid() {
        let ics = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nBEGIN:VEVENT\r\nDTSTART;VALUE=DATE:20250912\r\nSUMMARY:Art Walk\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
        let url = "https://example.com/events/art-walk";
        let event = parse_event(ics, url, now()).unwrap();

        assert!(event.is_all_day());
        assert_eq!(
            event.start,
            EventTime::Date(NaiveDate::from_ymd_opt(2025, 9, 12).unwrap())
        );
        assert_eq!(event.uid, synthesize_uid(url));
        assert!(event.end.is_none());
    }

    #[test]
    fn rejects_non_calendar_content() {
        assert!(parse_event("<html>Not found</html>", "https://x.test", now()).is_none());
        assert!(parse_event("This is not valid ICS content", "https://x.test", now()).is_none());
    }

    #[test]
    fn rejects_calendar_without_dtstart() {
        let ics = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nBEGIN:VEVENT\r\nUID:x\r\nSUMMARY:No time\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
        assert!(parse_event(ics, "https://x.test", now()).is_none());
    }

    #[test]
    fn unescapes_text_values() {
        assert_eq!(unescape_text(r"Main St\, Suite 2\nDowntown"), "Main St, Suite 2\nDowntown");
        assert_eq!(unescape_text(r"a\;b\\c"), r"a;b\c");
    }
}
