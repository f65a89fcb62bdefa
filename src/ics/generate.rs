//! Merged calendar generation.

use std::collections::BTreeMap;

use icalendar::{Calendar, Component, EventLike, Property, ValueType};

use super::parse::unescape_text;
use crate::models::{CustomProperty, Event, EventTime, OutputConfig};

/// Serialize already-ordered events into one calendar document.
///
/// Output depends only on `events` and `meta`: DTSTAMP is each event's
/// fetch time, so the same input yields byte-identical output.
pub fn generate_calendar(events: &[Event], meta: &OutputConfig) -> String {
    let mut cal = Calendar::new();
    cal.name(&meta.calendar_name);
    cal.description(&meta.calendar_description);

    for event in events {
        cal.push(to_ics_event(event));
    }
    let cal = cal.done();

    let mut timezones: BTreeMap<&str, &[String]> = BTreeMap::new();
    for tz in events.iter().flat_map(|e| &e.timezones) {
        timezones.entry(tz.tzid.as_str()).or_insert(&tz.lines);
    }

    post_process(&cal.to_string(), &meta.prod_id, &timezones)
}

fn to_ics_event(event: &Event) -> icalendar::Event {
    let mut ics_event = icalendar::Event::new();
    ics_event.uid(&event.uid);
    ics_event.summary(&event.summary);
    ics_event.add_property(
        "DTSTAMP",
        event.fetched_at.format("%Y%m%dT%H%M%SZ").to_string(),
    );

    add_datetime_property(&mut ics_event, "DTSTART", &event.start);
    if let Some(ref end) = event.end {
        add_datetime_property(&mut ics_event, "DTEND", end);
    }

    if let Some(ref loc) = event.location {
        ics_event.location(loc);
    }
    if !event.description.is_empty() {
        ics_event.description(&event.description);
    }
    ics_event.add_property("URL", &event.source_url);

    for custom in &event.custom_properties {
        ics_event.append_multi_property(to_ics_property(custom));
    }

    ics_event.done()
}

/// Rebuild an `X-` property with its parameters.
///
/// The stored value is still escaped; an explicit `VALUE=TEXT` makes the
/// writer escape again, so that case is unescaped first.
fn to_ics_property(custom: &CustomProperty) -> Property {
    let is_text = custom
        .params
        .iter()
        .any(|(k, v)| k.eq_ignore_ascii_case("VALUE") && v.eq_ignore_ascii_case("TEXT"));
    let value = if is_text {
        unescape_text(&custom.value)
    } else {
        custom.value.clone()
    };

    let mut prop = Property::new(&custom.name, value);
    for (key, param) in &custom.params {
        prop.add_parameter(key, param);
    }
    prop
}

fn add_datetime_property(ics_event: &mut icalendar::Event, name: &str, time: &EventTime) {
    match time {
        EventTime::Date(d) => {
            let mut prop = Property::new(name, d.format("%Y%m%d").to_string());
            prop.append_parameter(ValueType::Date);
            ics_event.append_property(prop);
        }
        EventTime::DateTimeUtc(dt) => {
            ics_event.add_property(name, dt.format("%Y%m%dT%H%M%SZ").to_string());
        }
        EventTime::DateTimeFloating(dt) => {
            ics_event.add_property(name, dt.format("%Y%m%dT%H%M%S").to_string());
        }
        EventTime::DateTimeZoned { datetime, tzid } => {
            let mut prop = Property::new(name, datetime.format("%Y%m%dT%H%M%S").to_string());
            prop.add_parameter("TZID", tzid);
            ics_event.append_property(prop);
        }
    }
}

/// Set PRODID and splice VTIMEZONE definitions in ahead of the first
/// component.
fn post_process(ics: &str, prod_id: &str, timezones: &BTreeMap<&str, &[String]>) -> String {
    let mut result = String::with_capacity(ics.len());
    let mut prod_id_written = false;
    let mut timezones_written = false;

    for line in ics.lines() {
        if line.starts_with("PRODID:") {
            push_line(&mut result, &format!("PRODID:{prod_id}"));
            prod_id_written = true;
            continue;
        }

        let body_starts =
            (line.starts_with("BEGIN:V") && line != "BEGIN:VCALENDAR") || line == "END:VCALENDAR";
        if body_starts && !prod_id_written {
            push_line(&mut result, &format!("PRODID:{prod_id}"));
            prod_id_written = true;
        }
        if body_starts && !timezones_written {
            for lines in timezones.values() {
                for tz_line in lines.iter() {
                    push_folded(&mut result, tz_line);
                }
            }
            timezones_written = true;
        }

        push_line(&mut result, line);
    }

    result
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    out.push_str("\r\n");
}

/// Fold a content line at 75 octets without splitting a character.
fn push_folded(out: &mut String, line: &str) {
    let mut remaining = line;
    let mut limit = 75;
    while remaining.len() > limit {
        let mut cut = limit;
        while !remaining.is_char_boundary(cut) {
            cut -= 1;
        }
        let (head, tail) = remaining.split_at(cut);
        push_line(out, head);
        out.push(' ');
        remaining = tail;
        limit = 74;
    }
    push_line(out, remaining);
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::*;
    use crate::models::TimezoneDefinition;

    fn event(uid: &str, start: EventTime) -> Event {
        Event {
            uid: uid.to_string(),
            summary: "Concert".to_string(),
            start,
            end: None,
            location: Some("Federal Hill Commons".to_string()),
            source_url: format!("https://example.com/events/{uid}"),
            description: "Live music on the lawn".to_string(),
            fetched_at: Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap(),
            custom_properties: Vec::new(),
            timezones: Vec::new(),
        }
    }

    #[test]
    fn writes_header_and_overrides() {
        let events = vec![event(
            "concert",
            EventTime::DateTimeUtc(Utc.with_ymd_and_hms(2025, 6, 20, 23, 0, 0).unwrap()),
        )];
        let meta = OutputConfig {
            prod_id: "-//Test//Agg//EN".to_string(),
            ..OutputConfig::default()
        };
        let ics = generate_calendar(&events, &meta);

        assert!(ics.starts_with("BEGIN:VCALENDAR\r\n"));
        assert!(ics.contains("PRODID:-//Test//Agg//EN\r\n"));
        assert!(ics.contains("X-WR-CALNAME:Noblesville Main Street Events"));
        assert!(ics.contains("UID:concert\r\n"));
        assert!(ics.contains("DTSTART:20250620T230000Z\r\n"));
        assert!(ics.contains("DTSTAMP:20250601T080000Z\r\n"));
        assert!(ics.contains("URL:https://example.com/events/concert\r\n"));
        assert!(ics.contains("DESCRIPTION:Live music on the lawn\r\n"));
        assert!(ics.contains("LOCATION:Federal Hill Commons\r\n"));
        assert!(ics.trim_end().ends_with("END:VCALENDAR"));
    }

    #[test]
    fn all_day_and_zoned_times_round_trip() {
        let mut zoned = event(
            "zoned",
            EventTime::DateTimeZoned {
                datetime: NaiveDate::from_ymd_opt(2025, 7, 4)
                    .unwrap()
                    .and_hms_opt(18, 0, 0)
                    .unwrap(),
                tzid: "America/Indiana/Indianapolis".to_string(),
            },
        );
        zoned.timezones = vec![TimezoneDefinition {
            tzid: "America/Indiana/Indianapolis".to_string(),
            lines: vec![
                "BEGIN:VTIMEZONE".to_string(),
                "TZID:America/Indiana/Indianapolis".to_string(),
                "END:VTIMEZONE".to_string(),
            ],
        }];
        let mut duplicate_tz = zoned.clone();
        duplicate_tz.uid = "zoned-2".to_string();
        let all_day = event(
            "fair",
            EventTime::Date(NaiveDate::from_ymd_opt(2025, 9, 12).unwrap()),
        );

        let ics = generate_calendar(&[zoned, duplicate_tz, all_day], &OutputConfig::default());

        assert!(ics.contains("DTSTART;TZID=America/Indiana/Indianapolis:20250704T180000\r\n"));
        assert!(ics.contains("DTSTART;VALUE=DATE:20250912\r\n"));
        assert_eq!(ics.matches("BEGIN:VTIMEZONE").count(), 1);
        let tz_at = ics.find("BEGIN:VTIMEZONE").unwrap();
        let first_event_at = ics.find("BEGIN:VEVENT").unwrap();
        assert!(tz_at < first_event_at);
    }

    #[test]
    fn x_properties_survive_with_repeats_and_parameters() {
        let source = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nBEGIN:VEVENT\r\nUID:tags@example.com\r\nDTSTART:20250704T220000Z\r\nSUMMARY:Tagged\r\nX-TAG:one\r\nX-TAG:two\r\nX-ALT-DESC;FMTTYPE=text/html:<b>hi</b>\r\nX-NOTE;VALUE=TEXT:a\\, b\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
        let fetched_at = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
        let parsed = crate::ics::parse_event(source, "https://x.test/e", fetched_at).unwrap();

        let ics = generate_calendar(&[parsed], &OutputConfig::default());

        assert!(ics.contains("X-TAG:one\r\n"));
        assert!(ics.contains("X-TAG:two\r\n"));
        assert!(ics.find("X-TAG:one").unwrap() < ics.find("X-TAG:two").unwrap());
        assert!(ics.contains("X-ALT-DESC;FMTTYPE=text/html:<b>hi</b>\r\n"));
        assert!(ics.contains("X-NOTE;VALUE=TEXT:a\\, b\r\n"));

        // Regenerating from the output is stable
        let again = crate::ics::parse_event(&ics, "https://x.test/e", fetched_at).unwrap();
        assert_eq!(generate_calendar(&[again], &OutputConfig::default()), ics);
    }

    #[test]
    fn long_timezone_lines_are_folded() {
        let mut out = String::new();
        let line = format!("X-LONG:{}", "a".repeat(100));
        push_folded(&mut out, &line);
        let lines: Vec<&str> = out.split("\r\n").filter(|l| !l.is_empty()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].len(), 75);
        assert!(lines[1].starts_with(' '));
        assert_eq!(lines[0].len() + lines[1].len() - 1, line.len());
    }
}
