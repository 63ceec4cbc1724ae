//! This client fetches the contest calendar and parses it into contest events.
//!
//! The calendar is a single table. Header rows carry a date or a date range in a `<strong>`
//! element, every following row with a link is a contest on those dates.

use anyhow::{anyhow, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use log::{debug, info};
use regex::Regex;
use reqwest::Response;
use scraper::{ElementRef, Html, Selector};

pub static URL: &str =
    "https://www.darc.de/der-club/referate/conteste/ct-kalender/terminuebersicht/";

static ROW_SELECTOR: &str = "table tbody tr";
static CELL_SELECTOR: &str = "td";
static HEADER_SELECTOR: &str = "strong";
static LINK_SELECTOR: &str = "a";

static TIME_PATTERN: &str = r"(?xi)
    ^
    (?P<hour>\d{1,2})
    (?:
        [:.]?
        (?P<minute>\d{2})
        (?::(?P<second>\d{2}))?
    )?
    \s*
    (?:z|utc|uhr|h)? # zone or unit suffix
    $
";

/// A single contest as listed in the calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContestEvent {
    pub title: String,
    pub start: NaiveDateTime,
    pub end: Option<NaiveDateTime>,
    pub mode: String,
    pub note: String,
}

/// The dates announced by the most recent header row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

/// The texts of a row with a contest link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContestCells {
    pub title: String,
    pub time: String,
    pub mode: String,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowKind {
    Header(String),
    Contest(ContestCells),
    Other,
}

/// A contest row together with the dates it inherited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatedRow {
    pub range: DateRange,
    pub cells: ContestCells,
}

#[derive(Debug, Clone, Copy)]
struct DayMonth {
    day: u32,
    month: Option<u32>,
}

struct RowSelectors {
    row: Selector,
    cell: Selector,
    header: Selector,
    link: Selector,
}

impl RowSelectors {
    fn new() -> Result<Self> {
        Ok(Self {
            row: selector(ROW_SELECTOR)?,
            cell: selector(CELL_SELECTOR)?,
            header: selector(HEADER_SELECTOR)?,
            link: selector(LINK_SELECTOR)?,
        })
    }
}

impl DateRange {
    /// Read the dates of a header like `Sa. 06.01.-So. 07.01.` or `Sa 06.-So 07.01.`.
    ///
    /// The year is always `current_year`, whatever the header says.
    pub fn from_header(text: &str, current_year: i32) -> DateRange {
        let (first, second) = match text.split_once('-') {
            Some((first, second)) => (first, Some(second)),
            None => (text, None),
        };
        let first = day_month(first);
        let second = second.and_then(day_month);
        let start = first.and_then(|first| {
            date(
                current_year,
                first.day,
                first.month.or(second.and_then(|second| second.month)),
            )
        });
        let end = second
            .and_then(|second| date(current_year, second.day, second.month))
            .or(start);
        DateRange { start, end }
    }

    /// The range in effect after `row`; only header rows replace it.
    pub fn advance(self, row: &RowKind, current_year: i32) -> DateRange {
        match row {
            RowKind::Header(text) => DateRange::from_header(text, current_year),
            _ => self,
        }
    }
}

/// Get all contest events listed on the calendar page at `url`.
pub async fn get(url: &str, current_year: i32) -> Result<Vec<ContestEvent>> {
    let response = get_response(url).await?;
    info!("fetched {url} ({})", response.status());
    parse(&response.text().await?, current_year)
}

/// Get the calendar page, failing on any non-success status.
async fn get_response(url: &str) -> Result<Response> {
    let client = reqwest::Client::new();
    let response = client.get(url).send().await?.error_for_status()?;
    Ok(response)
}

/// Parse the calendar HTML to contest events, in document order.
pub fn parse(html: &str, current_year: i32) -> Result<Vec<ContestEvent>> {
    let dom = Html::parse_document(html);
    let selectors = RowSelectors::new()?;
    let time_regex = Regex::new(TIME_PATTERN)?;
    let rows: Vec<RowKind> = dom
        .select(&selectors.row)
        .map(|row| classify(row, &selectors))
        .collect();
    let contest_rows = rows
        .iter()
        .filter(|row| matches!(row, RowKind::Contest(_)))
        .count();
    let events: Vec<ContestEvent> = inherit_dates(rows, current_year)
        .filter_map(|row| normalize(&time_regex, row))
        .collect();
    info!(
        "extracted {} contest events, dropped {} contest rows",
        events.len(),
        contest_rows - events.len()
    );
    Ok(events)
}

/// Pair every contest row with the dates of the nearest header row above it.
///
/// Contest rows before the first usable header are skipped.
pub fn inherit_dates<I>(rows: I, current_year: i32) -> impl Iterator<Item = DatedRow>
where
    I: IntoIterator<Item = RowKind>,
{
    rows.into_iter()
        .scan(DateRange::default(), move |range, row| {
            *range = range.advance(&row, current_year);
            let dated_row = match row {
                RowKind::Contest(cells) if range.start.is_some() => Some(DatedRow {
                    range: *range,
                    cells,
                }),
                RowKind::Contest(cells) => {
                    debug!("dropping {:?}: no date header above it", cells.title);
                    None
                }
                _ => None,
            };
            Some(dated_row)
        })
        .flatten()
}

/// Build the event of a dated row.
///
/// Returns `None` when the start time cannot be read. An unreadable end time only drops the end.
pub fn normalize(time_regex: &Regex, row: DatedRow) -> Option<ContestEvent> {
    let start_date = row.range.start?;
    let (start_text, end_text) = match row.cells.time.split_once('-') {
        Some((start_text, end_text)) => (start_text.trim(), end_text.trim()),
        None => (row.cells.time.trim(), ""),
    };
    let Some(start_time) = parse_time(time_regex, start_text) else {
        debug!(
            "dropping {:?}: no start time in {:?}",
            row.cells.title, row.cells.time
        );
        return None;
    };
    let end = parse_time(time_regex, end_text)
        .map(|end_time| row.range.end.unwrap_or(start_date).and_time(end_time));
    Some(ContestEvent {
        title: row.cells.title,
        start: start_date.and_time(start_time),
        end,
        mode: row.cells.mode,
        note: row.cells.note,
    })
}

fn classify(row: ElementRef, selectors: &RowSelectors) -> RowKind {
    let cells: Vec<ElementRef> = row.select(&selectors.cell).collect();
    let Some(first) = cells.first() else {
        return RowKind::Other;
    };
    if let Some(header) = first.select(&selectors.header).next() {
        return RowKind::Header(text_of(header));
    }
    let Some(link) = first.select(&selectors.link).next() else {
        return RowKind::Other;
    };
    let column = |index: usize| cells.get(index).map(|cell| text_of(*cell)).unwrap_or_default();
    RowKind::Contest(ContestCells {
        title: text_of(link),
        time: column(1),
        mode: column(2),
        note: column(3),
    })
}

/// The trimmed text pieces of an element, joined, with no-break spaces made plain.
fn text_of(element: ElementRef) -> String {
    element
        .text()
        .map(str::trim)
        .collect::<String>()
        .replace('\u{a0}', " ")
}

/// Read the day and month of a header segment, skipping any weekday in front.
fn day_month(segment: &str) -> Option<DayMonth> {
    let fragment = segment.trim_start_matches(|c: char| !c.is_ascii_digit());
    let mut pieces = fragment
        .split('.')
        .map(str::trim)
        .filter(|piece| !piece.is_empty());
    let day: u32 = pieces.next()?.parse().ok()?;
    let month = match pieces.next() {
        Some(piece) => Some(piece.parse::<u32>().ok()?),
        None => None,
    };
    Some(DayMonth { day, month })
}

fn date(year: i32, day: u32, month: Option<u32>) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month?, day)
}

fn parse_time(time_regex: &Regex, text: &str) -> Option<NaiveTime> {
    let captures = time_regex.captures(text)?;
    let hour: u32 = captures["hour"].parse().ok()?;
    let minute: u32 = match captures.name("minute") {
        Some(minute) => minute.as_str().parse().ok()?,
        None => 0,
    };
    let second: u32 = match captures.name("second") {
        Some(second) => second.as_str().parse().ok()?,
        None => 0,
    };
    NaiveTime::from_hms_opt(hour, minute, second)
}

fn selector(selectors: &str) -> Result<Selector> {
    Selector::parse(selectors).map_err(|err| anyhow!("invalid selector {selectors:?}: {err:?}"))
}
