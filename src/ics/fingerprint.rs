//! Content fingerprints for change detection across runs.

use icalendar::parser::unfold;
use sha2::{Digest, Sha256};

/// Normalize calendar text so cosmetic differences do not change the hash.
///
/// Unfolds continuation lines, unifies line endings, strips trailing
/// whitespace and drops `DTSTAMP`, which servers stamp per request.
pub fn normalize(body: &str) -> String {
    let unified = body.replace("\r\n", "\n").replace('\r', "\n");
    let unfolded = unfold(&unified);
    unfolded
        .split('\n')
        .map(str::trim_end)
        .filter(|line| !line.is_empty() && !line.starts_with("DTSTAMP"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// SHA-256 hex over the normalized calendar text.
pub fn fingerprint(body: &str) -> String {
    hex::encode(Sha256::digest(normalize(body).as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:a\r\nDTSTAMP:20250101T000000Z\r\nSUMMARY:Farmers Market\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";

    #[test]
    fn dtstamp_and_line_endings_do_not_matter() {
        let restamped = BASE
            .replace("20250101T000000Z", "20250202T121212Z")
            .replace("\r\n", "\n");
        assert_eq!(fingerprint(BASE), fingerprint(&restamped));
    }

    #[test]
    fn folding_does_not_matter() {
        let folded = BASE.replace("SUMMARY:Farmers Market", "SUMMARY:Farmers\r\n  Market");
        assert_eq!(fingerprint(BASE), fingerprint(&folded));

        let tab_folded = BASE.replace("SUMMARY:Farmers Market", "SUMMARY:Farm\n\ters Market");
        assert_eq!(normalize(BASE), normalize(&tab_folded));
    }

    #[test]
    fn content_change_changes_hash() {
        let edited = BASE.replace("Farmers Market", "Night Market");
        assert_ne!(fingerprint(BASE), fingerprint(&edited));
    }
}
