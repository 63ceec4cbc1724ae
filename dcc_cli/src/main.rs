use std::path::PathBuf;

use anyhow::Result;
use chrono::{Datelike, Local};
use clap::{ArgAction, Parser};
use dcc_core::{
    calendar,
    contest_client::{self, ContestEvent},
    filter::{self, Filter, MonthBitmask},
    table,
};
use log::LevelFilter;

static TITLE: &str = "Contests";

/// DARC contest calendar with iCalendar export and purge
#[derive(Debug, Parser)]
pub struct Arguments {
    /// month 1-12, repeatable; all months when omitted
    #[arg(short = 'm', long = "month", value_parser = clap::value_parser!(u32).range(1..=12))]
    pub months: Vec<u32>,
    /// mode filter in SQL LIKE style, repeatable; case and spaces are ignored
    #[arg(short = 'd', long = "mode")]
    pub modes: Vec<String>,
    /// path of the iCalendar file to write
    #[arg(short = 'o', long = "ics", value_name = "ICS_FILE")]
    pub ics: Option<PathBuf>,
    /// mark the calendar with METHOD:CANCEL and every contest with STATUS:CANCELLED
    #[arg(short, long)]
    pub purge: bool,
    /// the calendar page
    #[arg(long, default_value = contest_client::URL)]
    pub url: String,
    /// log more, repeatable
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl From<&Arguments> for MonthBitmask {
    fn from(value: &Arguments) -> Self {
        let mut month_bitmask = MonthBitmask::none();
        for month in value.months.iter().filter_map(|month| MonthBitmask::from_month(*month)) {
            month_bitmask |= month;
        }
        month_bitmask
    }
}

impl From<&Arguments> for Filter {
    fn from(value: &Arguments) -> Self {
        Filter {
            months: MonthBitmask::from(value),
            modes: value.modes.clone(),
        }
    }
}

impl Arguments {
    /// The line printed above the table, naming the active filters.
    fn summary(&self) -> String {
        let mut summary = String::from(TITLE);
        if !self.months.is_empty() {
            let months: Vec<String> = self.months.iter().map(u32::to_string).collect();
            summary.push_str(&format!(" MONATE={}", months.join(",")));
        }
        if !self.modes.is_empty() {
            summary.push_str(&format!(" MODE~'{}'", self.modes.join(",")));
        }
        if self.purge {
            summary.push_str(" - PURGE");
        }
        summary
    }

    fn calendar_name(&self) -> String {
        if self.modes.is_empty() {
            String::from(TITLE)
        } else {
            format!("{TITLE} - {}", self.modes.join(","))
        }
    }

    /// Write the iCalendar file when a path is given and get the status lines to print.
    ///
    /// A failed export is reported, not returned.
    fn export(&self, events: &[ContestEvent]) -> Vec<String> {
        let Some(path) = &self.ics else {
            return vec![];
        };
        let mut lines = vec![];
        if events.is_empty() {
            lines.push(String::from(
                "Warnung: Keine Events gefiltert, erstelle leere ICS-Datei.",
            ));
        }
        let name = self.calendar_name();
        match calendar::export(events, path, Some(name.as_str()), self.purge) {
            Ok(()) => {
                let purge = if self.purge {
                    " (PURGE: METHOD=CANCEL, STATUS=CANCELLED)"
                } else {
                    ""
                };
                lines.push(format!(
                    "ICS-Datei '{}' erfolgreich erstellt{purge}.",
                    path.display()
                ));
            }
            Err(err) => lines.push(format!("Fehler beim Schreiben der ICS-Datei: {err:#}")),
        }
        lines
    }

    fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Arguments::parse();
    env_logger::Builder::new()
        .filter_level(args.log_level())
        .parse_default_env()
        .init();
    let current_year = Local::now().year();
    let events = contest_client::get(&args.url, current_year).await?;
    let selected = filter::select(events, &Filter::from(&args), current_year);
    println!("{}", args.summary());
    print!("{}", table::render(&selected));
    for line in args.export(&selected) {
        println!("{line}");
    }
    Ok(())
}
