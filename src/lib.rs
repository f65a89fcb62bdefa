// src/lib.rs

//! ICS calendar aggregator library
//!
//! Discovers event pages on a listing page, fetches each event's calendar
//! file, and publishes one merged, deduplicated `.ics` artifact.

pub mod error;
pub mod ics;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
