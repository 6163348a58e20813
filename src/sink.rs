//! Attendance events and where they are written
//!
//! Each record is one line: `<payload>,<RFC 3339 timestamp>`. The
//! timestamp never contains a comma, so a record is split at its last one
//! and payloads may contain commas freely.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{Error, Result};

const STORE: &str = "attendance log";

/// One successful, non-suppressed authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceEvent {
    payload: String,
    observed_at: DateTime<Utc>,
}

impl AttendanceEvent {
    pub(crate) fn new(payload: impl Into<String>, observed_at: DateTime<Utc>) -> Self {
        Self {
            payload: payload.into(),
            observed_at,
        }
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }

    /// Encode as a log line, without the trailing newline.
    pub fn to_record(&self) -> String {
        format!(
            "{},{}",
            self.payload,
            self.observed_at.to_rfc3339_opts(SecondsFormat::Millis, true)
        )
    }

    /// Decode a line written by [`to_record`](Self::to_record).
    pub fn from_record(line: &str) -> Option<Self> {
        let (payload, stamp) = line.trim_end_matches(['\r', '\n']).rsplit_once(',')?;
        let observed_at = DateTime::parse_from_rfc3339(stamp.trim()).ok()?;
        Some(Self::new(payload, observed_at.with_timezone(&Utc)))
    }
}

/// Append-only destination for attendance events.
pub trait EventSink {
    /// Durably append `event`. On error nothing already written is touched.
    fn append(&mut self, event: &AttendanceEvent) -> Result<()>;

    /// Push out anything buffered. Called when a session ends.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<T: EventSink + ?Sized> EventSink for &mut T {
    fn append(&mut self, event: &AttendanceEvent) -> Result<()> {
        (**self).append(event)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

impl<T: EventSink + ?Sized> EventSink for Box<T> {
    fn append(&mut self, event: &AttendanceEvent) -> Result<()> {
        (**self).append(event)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// Newline-delimited log file, held open for the life of the sink.
#[derive(Debug)]
pub struct FileEventSink {
    path: PathBuf,
    file: File,
}

impl FileEventSink {
    /// Open (creating if needed) the log at `path` for appending.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let open = || -> io::Result<File> {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            OpenOptions::new().create(true).append(true).open(&path)
        };
        let file = open().map_err(|e| Error::storage(STORE, &path, e))?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back every well-formed record in the log at `path`.
    ///
    /// A missing log has no events. Malformed lines are skipped.
    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<AttendanceEvent>> {
        let path = path.as_ref();
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::storage(STORE, path, e)),
        };

        let mut events = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| Error::storage(STORE, path, e))?;
            if let Some(event) = AttendanceEvent::from_record(&line) {
                events.push(event);
            }
        }
        Ok(events)
    }
}

impl EventSink for FileEventSink {
    fn append(&mut self, event: &AttendanceEvent) -> Result<()> {
        let mut line = event.to_record();
        line.push('\n');
        self.file
            .write_all(line.as_bytes())
            .and_then(|()| self.file.sync_data())
            .map_err(|e| Error::storage(STORE, &self.path, e))
    }

    fn flush(&mut self) -> Result<()> {
        self.file
            .flush()
            .map_err(|e| Error::storage(STORE, &self.path, e))
    }
}

/// Collects events in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Vec<AttendanceEvent>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[AttendanceEvent] {
        &self.events
    }
}

impl EventSink for MemorySink {
    fn append(&mut self, event: &AttendanceEvent) -> Result<()> {
        self.events.push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_760_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_record_layout() {
        let event = AttendanceEvent::new("X", Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap());
        assert_eq!(event.to_record(), "X,2026-10-19T08:00:00.000Z");
    }

    #[test]
    fn test_record_with_commas_in_payload() {
        let event = AttendanceEvent::new("Name: Doe, Jane | ID: DJ12345", at(0));
        let parsed = AttendanceEvent::from_record(&event.to_record()).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_malformed_record() {
        assert!(AttendanceEvent::from_record("no separator").is_none());
        assert!(AttendanceEvent::from_record("x,yesterday").is_none());
    }

    #[test]
    fn test_file_sink_appends_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("log.txt");

        {
            let mut sink = FileEventSink::open(&path).unwrap();
            sink.append(&AttendanceEvent::new("a", at(0))).unwrap();
            sink.append(&AttendanceEvent::new("b", at(1))).unwrap();
            sink.flush().unwrap();
        }
        {
            let mut sink = FileEventSink::open(&path).unwrap();
            sink.append(&AttendanceEvent::new("a", at(10))).unwrap();
        }

        let events = FileEventSink::read_all(&path).unwrap();
        let payloads: Vec<_> = events.iter().map(AttendanceEvent::payload).collect();
        assert_eq!(payloads, ["a", "b", "a"]);
        assert_eq!(events[2].observed_at(), at(10));
    }

    #[test]
    fn test_read_missing_log() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FileEventSink::read_all(dir.path().join("none.txt"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_open_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            FileEventSink::open(dir.path()),
            Err(Error::StorageUnavailable { .. })
        ));
    }
}
