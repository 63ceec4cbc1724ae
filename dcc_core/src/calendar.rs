//! This module turns contest events into an iCalendar file.

use std::{
    fs::{create_dir_all, write},
    path::Path,
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use icalendar::{Calendar, Component, Event, Property};
use log::info;
use uuid::Uuid;

use crate::contest_client::ContestEvent;

static PROD_ID: &str = "-//DARC CT Contest Calendar//darc.de//";
static UID_DOMAIN: &str = "darc.de";
static FORMAT: &str = "%Y%m%dT%H%M%S";
static UTC_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Build the calendar of the events.
///
/// With `purge` the calendar is a cancellation of all its events, used to retract a calendar
/// which was imported before.
pub fn get_calendar(
    events: &[ContestEvent],
    name: Option<&str>,
    purge: bool,
    stamp: DateTime<Utc>,
) -> Calendar {
    let mut calendar = Calendar::new();
    if let Some(name) = name {
        calendar.append_property(Property::new("X-WR-CALNAME", escape_text(name)));
    }
    if purge {
        calendar.append_property(Property::new("METHOD", "CANCEL"));
    }
    let stamp = stamp.format(UTC_FORMAT).to_string();
    for event in events {
        calendar.push(get_event(event, &stamp, purge));
    }
    calendar.done()
}

/// Serialize the calendar with our own product id.
pub fn generate(calendar: &Calendar) -> String {
    let mut generated = String::new();
    for line in calendar.to_string().lines() {
        if line.starts_with("PRODID:") {
            generated.push_str(&format!("PRODID:{PROD_ID}"));
        } else {
            generated.push_str(line);
        }
        generated.push_str("\r\n");
    }
    generated
}

/// Write the calendar of the events to `path`, creating missing directories.
pub fn export(events: &[ContestEvent], path: &Path, name: Option<&str>, purge: bool) -> Result<()> {
    if let Some(directory) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        create_dir_all(directory)
            .with_context(|| format!("cannot create directory {}", directory.display()))?;
    }
    let calendar = get_calendar(events, name, purge, Utc::now());
    write(path, generate(&calendar)).with_context(|| format!("cannot write {}", path.display()))?;
    info!("wrote {} events to {}", events.len(), path.display());
    Ok(())
}

/// Build the event property by property, as the times are floating and carry no TZID.
fn get_event(event: &ContestEvent, stamp: &str, purge: bool) -> Event {
    let mut ics_event = Event::new();
    ics_event.uid(&uid());
    ics_event.add_property("DTSTAMP", stamp);
    ics_event.add_property("DTSTART", event.start.format(FORMAT).to_string());
    if let Some(end) = event.end {
        ics_event.add_property("DTEND", end.format(FORMAT).to_string());
    }
    ics_event.summary(&escape_text(&event.title));
    ics_event.description(&escape_text(&description(event)));
    if purge {
        ics_event.add_property("STATUS", "CANCELLED");
    }
    ics_event.done()
}

fn description(event: &ContestEvent) -> String {
    let mut description = format!("Mode: {}", event.mode);
    if !event.note.is_empty() {
        description.push_str(&format!("\nNotiz: {}", event.note));
    }
    description
}

/// Get a fresh unique id; contests have no stable identity on the calendar page.
fn uid() -> String {
    format!("{}@{UID_DOMAIN}", Uuid::new_v4())
}

/// Escape a TEXT value as RFC 5545 requires.
fn escape_text(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashSet,
        fs::read_to_string,
        io::{BufReader, Cursor},
    };

    use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
    use ical::{
        generator::{IcalCalendar, IcalEvent},
        IcalParser,
    };

    use crate::{
        calendar::{description, escape_text, export, generate, get_calendar, PROD_ID},
        contest_client::ContestEvent,
    };

    fn at(value: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M").unwrap()
    }

    fn stamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap()
    }

    fn get_test_events() -> Vec<ContestEvent> {
        vec![
            ContestEvent {
                title: "Test Contest".to_string(),
                start: at("2025-01-06 15:00"),
                end: Some(at("2025-01-07 18:00")),
                mode: "CW".to_string(),
                note: String::new(),
            },
            ContestEvent {
                title: "UKW-Fieldday".to_string(),
                start: at("2025-03-01 08:00"),
                end: None,
                mode: "FM".to_string(),
                note: "nur 2 m".to_string(),
            },
        ]
    }

    /// Read generated iCalendar text back into its properties.
    fn parse_generated(ics: &str) -> IcalCalendar {
        IcalParser::new(BufReader::new(Cursor::new(ics)))
            .next()
            .unwrap()
            .unwrap()
    }

    fn generated_calendar(events: &[ContestEvent], name: Option<&str>, purge: bool) -> IcalCalendar {
        parse_generated(&generate(&get_calendar(events, name, purge, stamp())))
    }

    fn get_property_value<'a>(event: &'a IcalEvent, property_name: &str) -> Option<&'a str> {
        event
            .properties
            .iter()
            .find(|property| property.name == property_name)
            .and_then(|property| property.value.as_deref())
    }

    fn get_calendar_property_value<'a>(
        calendar: &'a IcalCalendar,
        property_name: &str,
    ) -> Option<&'a str> {
        calendar
            .properties
            .iter()
            .find(|property| property.name == property_name)
            .and_then(|property| property.value.as_deref())
    }

    #[test]
    fn test_get_calendar() {
        let calendar = generated_calendar(&get_test_events(), Some("Contests"), false);
        assert_eq!(get_calendar_property_value(&calendar, "PRODID"), Some(PROD_ID));
        assert_eq!(get_calendar_property_value(&calendar, "VERSION"), Some("2.0"));
        assert_eq!(
            get_calendar_property_value(&calendar, "X-WR-CALNAME"),
            Some("Contests")
        );
        assert_eq!(get_calendar_property_value(&calendar, "METHOD"), None);
        assert_eq!(calendar.events.len(), 2);

        let first = &calendar.events[0];
        assert_eq!(get_property_value(first, "DTSTAMP"), Some("20250102T030405Z"));
        assert_eq!(get_property_value(first, "DTSTART"), Some("20250106T150000"));
        assert_eq!(get_property_value(first, "DTEND"), Some("20250107T180000"));
        assert_eq!(get_property_value(first, "SUMMARY"), Some("Test Contest"));
        assert_eq!(get_property_value(first, "DESCRIPTION"), Some("Mode: CW"));
        assert_eq!(get_property_value(first, "STATUS"), None);

        let second = &calendar.events[1];
        assert_eq!(get_property_value(second, "DTSTAMP"), Some("20250102T030405Z"));
        assert_eq!(get_property_value(second, "DTEND"), None);
        assert_eq!(
            get_property_value(second, "DESCRIPTION"),
            Some("Mode: FM\\nNotiz: nur 2 m")
        );
    }

    #[test]
    fn test_generate_single_prod_id() {
        let generated = generate(&get_calendar(&get_test_events(), None, false, stamp()));
        assert_eq!(generated.matches("PRODID:").count(), 1);
        assert!(generated.contains(&format!("PRODID:{PROD_ID}\r\n")));
    }

    #[test]
    fn test_get_calendar_without_name() {
        let calendar = generated_calendar(&get_test_events(), None, false);
        assert_eq!(get_calendar_property_value(&calendar, "X-WR-CALNAME"), None);
    }

    #[test]
    fn test_get_calendar_unique_ids() {
        let calendar = generated_calendar(&get_test_events(), None, false);
        let uids: HashSet<&str> = calendar
            .events
            .iter()
            .filter_map(|event| get_property_value(event, "UID"))
            .collect();
        assert_eq!(uids.len(), 2);
        assert!(uids.iter().all(|uid| uid.ends_with("@darc.de")));
    }

    #[test]
    fn test_get_calendar_purge() {
        let calendar = generated_calendar(&get_test_events(), Some("Contests"), true);
        assert_eq!(get_calendar_property_value(&calendar, "METHOD"), Some("CANCEL"));
        assert_eq!(calendar.events.len(), 2);
        assert!(calendar
            .events
            .iter()
            .all(|event| get_property_value(event, "STATUS") == Some("CANCELLED")));

        let generated = generate(&get_calendar(&get_test_events(), Some("Contests"), false, stamp()));
        assert!(!generated.contains("METHOD:CANCEL"));
        assert!(!generated.contains("STATUS:CANCELLED"));
    }

    #[test]
    fn test_get_calendar_empty() {
        let generated = generate(&get_calendar(&[], Some("Contests"), true, stamp()));
        assert!(generated.starts_with("BEGIN:VCALENDAR"));
        assert!(generated.trim_end().ends_with("END:VCALENDAR"));
        assert!(generated.contains("VERSION:2.0"));
        assert!(!generated.contains("BEGIN:VEVENT"));
        assert!(parse_generated(&generated).events.is_empty());
    }

    #[test]
    fn test_description() {
        let events = get_test_events();
        assert_eq!(description(&events[0]), "Mode: CW");
        assert_eq!(description(&events[1]), "Mode: FM\nNotiz: nur 2 m");
    }

    #[test]
    fn test_escape_text() {
        assert_eq!(escape_text("CW, SSB; RTTY"), "CW\\, SSB\\; RTTY");
        assert_eq!(escape_text("a\\b\nc"), "a\\\\b\\nc");
    }

    #[test]
    fn test_export_creates_directories() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("nested").join("deeper").join("contests.ics");
        export(&get_test_events(), &path, Some("Contests"), false).unwrap();
        let written = read_to_string(&path).unwrap();
        assert!(written.contains("BEGIN:VCALENDAR"));
        assert_eq!(written.matches("BEGIN:VEVENT").count(), 2);
        assert!(written.contains("SUMMARY:Test Contest"));
    }

    /// Long German texts are folded on character boundaries and read back unchanged.
    #[test]
    fn test_export_long_umlaut_texts() {
        let note = "Logs bis 14 Tage nach Contestende. Wertung für Stationen außerhalb DL \
                    und für Klubstationen getrennt. Frühe Einsendung erwünscht";
        let title = "Ä".repeat(60);
        let events = vec![ContestEvent {
            title: title.clone(),
            start: at("2025-04-05 07:00"),
            end: Some(at("2025-04-05 10:59")),
            mode: "SSB".to_string(),
            note: note.to_string(),
        }];
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("contests.ics");
        export(&events, &path, Some("Contests"), false).unwrap();
        let calendar = parse_generated(&read_to_string(&path).unwrap());
        let event = &calendar.events[0];
        assert_eq!(get_property_value(event, "SUMMARY"), Some(title.as_str()));
        // Unfolding may eat a blank at a fold, so blanks are not compared.
        let description = get_property_value(event, "DESCRIPTION").unwrap();
        assert_eq!(
            description.replace(' ', ""),
            format!("Mode: SSB\\nNotiz: {note}").replace(' ', "")
        );
    }

    #[test]
    fn test_export_failure() {
        let directory = tempfile::tempdir().unwrap();
        let result = export(&get_test_events(), directory.path(), None, false);
        assert!(result.is_err());
    }
}
