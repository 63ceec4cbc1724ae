//! This crate reads the contest calendar of the DARC contest department and turns it into
//! contest events, a printable table and an iCalendar file.
//!
//! The dates are read from <https://www.darc.de/der-club/referate/conteste/ct-kalender/terminuebersicht/>.

pub use icalendar;

pub mod calendar;
pub mod contest_client;
pub mod filter;
pub mod table;
