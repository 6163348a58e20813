//! Issuance audit trail
//!
//! One CSV row per issued token: name, id, artifact filename, and local
//! issue time. The header row is written when the file is first created.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};

use crate::error::{Error, Result};

const STORE: &str = "issuance audit";

pub const AUDIT_HEADER: [&str; 4] = ["Name", "ID", "QR Filename", "Created At"];

const CREATED_AT_FORMAT: &str = "%d-%m-%Y %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuanceRecord {
    pub display_name: String,
    pub id: String,
    pub artifact_name: String,
    pub issued_at: DateTime<Utc>,
}

impl IssuanceRecord {
    fn to_row(&self) -> String {
        let created_at = self
            .issued_at
            .with_timezone(&Local)
            .format(CREATED_AT_FORMAT)
            .to_string();
        csv_row([
            self.display_name.as_str(),
            self.id.as_str(),
            self.artifact_name.as_str(),
            created_at.as_str(),
        ])
    }
}

fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_owned()
    }
}

fn csv_row<'a>(fields: impl IntoIterator<Item = &'a str>) -> String {
    let mut row = fields.into_iter().map(csv_field).collect::<Vec<_>>().join(",");
    row.push_str("\r\n");
    row
}

pub trait AuditLog {
    fn record(&mut self, record: &IssuanceRecord) -> Result<()>;
}

impl<T: AuditLog + ?Sized> AuditLog for &mut T {
    fn record(&mut self, record: &IssuanceRecord) -> Result<()> {
        (**self).record(record)
    }
}

impl AuditLog for Vec<IssuanceRecord> {
    fn record(&mut self, record: &IssuanceRecord) -> Result<()> {
        self.push(record.clone());
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FileAuditLog {
    path: PathBuf,
}

impl FileAuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditLog for FileAuditLog {
    fn record(&mut self, record: &IssuanceRecord) -> Result<()> {
        let write = || -> io::Result<()> {
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
            let mut out = String::new();
            if file.metadata()?.len() == 0 {
                out.push_str(&csv_row(AUDIT_HEADER));
            }
            out.push_str(&record.to_row());
            file.write_all(out.as_bytes())?;
            file.sync_data()
        };
        write().map_err(|e| Error::storage(STORE, &self.path, e))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn record(name: &str) -> IssuanceRecord {
        IssuanceRecord {
            display_name: name.to_owned(),
            id: "AL12345".to_owned(),
            artifact_name: "Ada_Lovelace_AL12345_qr.svg".to_owned(),
            issued_at: Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_csv_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("Doe, Jane"), "\"Doe, Jane\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.csv");
        let mut log = FileAuditLog::new(&path);
        log.record(&record("Ada Lovelace")).unwrap();
        log.record(&record("Doe, Jane")).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Name,ID,QR Filename,Created At");
        assert!(lines[1].starts_with("Ada Lovelace,AL12345,Ada_Lovelace_AL12345_qr.svg,"));
        assert!(lines[2].starts_with("\"Doe, Jane\",AL12345,"));
    }

    #[test]
    fn test_created_at_is_local_time() {
        let rec = record("Ada Lovelace");
        let expected = rec
            .issued_at
            .with_timezone(&Local)
            .format(CREATED_AT_FORMAT)
            .to_string();
        assert!(rec.to_row().trim_end().ends_with(&expected));
    }

    #[test]
    fn test_vec_log() {
        let mut log: Vec<IssuanceRecord> = Vec::new();
        log.record(&record("Ada Lovelace")).unwrap();
        assert_eq!(log.len(), 1);
    }
}
