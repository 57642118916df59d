//! Historical market data loader.
//!
//! Files are headerless CSV with `#` comment lines and the columns
//! `date (MMDDYY), time (HHMMSS), balance, price, volume`.

use super::CancelWatch;
use crate::model::{MarketSnapshot, ProgressUpdate, RunEvent};
use anyhow::{anyhow, bail, Context, Result};
use std::path::Path;
use time::{Date, Month, PrimitiveDateTime, Time};
use tokio::sync::mpsc;

pub(crate) const LOADING_LABEL: &str = "Loading historical data";

/// Parameters for loading one historical data file.
pub(crate) struct LoadParams<'a> {
    pub path: &'a Path,
    pub progress_every: u64,
    pub event_tx: &'a mpsc::UnboundedSender<RunEvent>,
    pub cancel: &'a mut CancelWatch,
}

/// Read every snapshot from the file. Returns `None` if cancelled while reading.
pub(crate) fn load_snapshots(params: LoadParams<'_>) -> Result<Option<Vec<MarketSnapshot>>> {
    let LoadParams {
        path,
        progress_every,
        event_tx,
        cancel,
    } = params;

    let file_len = std::fs::metadata(path)
        .with_context(|| format!("stat {}", path.display()))?
        .len();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("open {}", path.display()))?;

    let mut snapshots = Vec::new();
    let mut record = csv::StringRecord::new();
    let mut rows = 0u64;
    let mut reported = 0u64;
    loop {
        if cancel.is_cancelled() {
            return Ok(None);
        }
        let more = reader
            .read_record(&mut record)
            .with_context(|| format!("read {}", path.display()))?;
        if !more {
            break;
        }
        let line = record.position().map(|p| p.line()).unwrap_or(rows + 1);
        let snapshot = parse_record(&record).with_context(|| format!("line {line}"))?;
        snapshots.push(snapshot);

        rows += 1;
        if rows % progress_every == 0 {
            // The reader sits past the record just parsed.
            reported = reader.position().byte();
            let _ = event_tx.send(RunEvent::Progress(ProgressUpdate::new(
                reported,
                file_len,
                LOADING_LABEL,
            )));
        }
    }
    if reported < file_len {
        let _ = event_tx.send(RunEvent::Progress(ProgressUpdate::new(
            file_len,
            file_len,
            LOADING_LABEL,
        )));
    }

    Ok(Some(snapshots))
}

fn parse_record(record: &csv::StringRecord) -> Result<MarketSnapshot> {
    if record.len() != 5 {
        bail!("expected 5 columns, found {}", record.len());
    }
    let date = parse_date(&record[0])?;
    let time = parse_time(&record[1])?;
    let balance: f64 = record[2]
        .parse()
        .with_context(|| format!("invalid balance {:?}", &record[2]))?;
    let price: f64 = record[3]
        .parse()
        .with_context(|| format!("invalid price {:?}", &record[3]))?;
    let volume: u64 = record[4]
        .parse()
        .with_context(|| format!("invalid volume {:?}", &record[4]))?;
    if !price.is_finite() || price <= 0.0 {
        bail!("price must be positive, got {price}");
    }
    Ok(MarketSnapshot {
        time: PrimitiveDateTime::new(date, time),
        balance,
        price,
        volume,
    })
}

fn two_digits(s: &str, at: usize) -> Result<u8> {
    s.get(at..at + 2)
        .and_then(|d| d.parse().ok())
        .ok_or_else(|| anyhow!("invalid digits in {s:?}"))
}

/// `MMDDYY`, years taken as 20YY.
fn parse_date(s: &str) -> Result<Date> {
    if s.len() != 6 {
        bail!("invalid date {s:?}, expected MMDDYY");
    }
    let month = Month::try_from(two_digits(s, 0)?).with_context(|| format!("invalid date {s:?}"))?;
    let day = two_digits(s, 2)?;
    let year = 2000 + i32::from(two_digits(s, 4)?);
    Date::from_calendar_date(year, month, day).with_context(|| format!("invalid date {s:?}"))
}

/// `HHMMSS`.
fn parse_time(s: &str) -> Result<Time> {
    if s.len() != 6 {
        bail!("invalid time {s:?}, expected HHMMSS");
    }
    Time::from_hms(two_digits(s, 0)?, two_digits(s, 2)?, two_digits(s, 4)?)
        .with_context(|| format!("invalid time {s:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineControl;
    use std::io::Write;
    use time::macros::datetime;

    fn write_data(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    fn load(path: &Path, cancel: &mut CancelWatch) -> Result<Option<Vec<MarketSnapshot>>> {
        let (event_tx, _event_rx) = mpsc::unbounded_channel();
        load_snapshots(LoadParams {
            path,
            progress_every: 1,
            event_tx: &event_tx,
            cancel,
        })
    }

    #[test]
    fn parses_rows_and_skips_comments() {
        let f = write_data(
            "# ES front month\n\
             010524,093000,12.5,4750.25,120\n\
             # gap\n\
             010524, 093001 ,-3,4750.50,80\n",
        );
        let (_tx, rx) = mpsc::unbounded_channel::<EngineControl>();
        let mut cancel = CancelWatch::new(rx);
        let rows = load(f.path(), &mut cancel).unwrap().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].time, datetime!(2024-01-05 09:30:00));
        assert_eq!(rows[0].balance, 12.5);
        assert_eq!(rows[1].price, 4750.50);
        assert_eq!(rows[1].volume, 80);
    }

    #[test]
    fn malformed_row_names_the_line() {
        let f = write_data("010524,093000,1,4750,10\n013224,093001,1,4750,10\n");
        let (_tx, rx) = mpsc::unbounded_channel::<EngineControl>();
        let mut cancel = CancelWatch::new(rx);
        let err = load(f.path(), &mut cancel).unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("line 2"), "{msg}");
        assert!(msg.contains("invalid date"), "{msg}");
    }

    #[test]
    fn wrong_column_count_is_rejected() {
        let f = write_data("010524,093000,1,4750\n");
        let (_tx, rx) = mpsc::unbounded_channel::<EngineControl>();
        let mut cancel = CancelWatch::new(rx);
        assert!(load(f.path(), &mut cancel).is_err());
    }

    #[test]
    fn cancelled_load_returns_none() {
        let f = write_data("010524,093000,1,4750,10\n");
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(EngineControl::Cancel).unwrap();
        let mut cancel = CancelWatch::new(rx);
        assert!(load(f.path(), &mut cancel).unwrap().is_none());
    }

    #[test]
    fn loading_reports_byte_progress() {
        let f = write_data("010524,093000,1,4750,10\n010524,093001,1,4751,10\n");
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (_tx, rx) = mpsc::unbounded_channel::<EngineControl>();
        let mut cancel = CancelWatch::new(rx);
        load_snapshots(LoadParams {
            path: f.path(),
            progress_every: 1,
            event_tx: &event_tx,
            cancel: &mut cancel,
        })
        .unwrap();

        let mut updates = Vec::new();
        while let Ok(RunEvent::Progress(p)) = event_rx.try_recv() {
            assert_eq!(p.label, LOADING_LABEL);
            updates.push(p);
        }
        assert!(updates.len() >= 2);
        assert!(updates[0].completed > 0);
        assert!(updates.windows(2).all(|w| w[0].completed <= w[1].completed));
        assert_eq!(updates.last().map(|p| p.percent()), Some(100));
    }

    #[test]
    fn sparse_loading_progress_still_finishes_at_full() {
        let f = write_data("010524,093000,1,4750,10\n010524,093001,1,4751,10\n# end\n");
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (_tx, rx) = mpsc::unbounded_channel::<EngineControl>();
        let mut cancel = CancelWatch::new(rx);
        load_snapshots(LoadParams {
            path: f.path(),
            progress_every: 1_000,
            event_tx: &event_tx,
            cancel: &mut cancel,
        })
        .unwrap();

        let Ok(RunEvent::Progress(p)) = event_rx.try_recv() else {
            panic!("expected a final loading update");
        };
        assert_eq!(p.completed, p.total);
        assert_eq!(p.percent(), 100);
        assert!(event_rx.try_recv().is_err());
    }
}
