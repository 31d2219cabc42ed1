//! ICS feed parsing.
//!
//! Turns the text of an RFC 5545 feed into [`RawCalendarEvent`](crate::event::RawCalendarEvent)s.

mod parse;

pub use parse::parse_feed;
