//! iCalendar parsing, fingerprinting and generation.

mod fingerprint;
mod generate;
mod parse;

pub use fingerprint::{fingerprint, normalize};
pub use generate::generate_calendar;
pub use parse::{looks_like_calendar, parse_event, unescape_text};
