//! Diagnostic archive layout and encoding.
//!
//! An archive holds one JSON file per record plus a description of the host:
//!
//! ```text
//! history/<index>_<timestamp>.json
//! errors/<index>_<timestamp>.json
//! user.json
//! ```
//!
//! Timestamps are RFC 3339 with milliseconds in UTC, e.g.
//! `2024-05-01T09:30:00.250Z`.

use std::io::{Cursor, Write};
use std::path::PathBuf;
use std::sync::OnceLock;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use zip::write::SimpleFileOptions;
use zip::{AesMode, CompressionMethod, ZipWriter};

use crate::config::{EncryptionStrength, ExportConfig};
use crate::environment::EnvironmentSnapshot;
use crate::error::Result;
use crate::storage::Snapshot;

/// Passphrase protection applied to every archive entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Protection<'a> {
    /// The shared passphrase.
    pub password: &'a str,
    /// AES key size.
    pub strength: EncryptionStrength,
}

/// A finished archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedArchive {
    /// Suggested file name.
    pub file_name: String,
    /// Encoded zip bytes.
    pub bytes: Vec<u8>,
    /// Where the archive was saved, if it was handed to a downloader.
    pub saved_to: Option<PathBuf>,
}

impl ExportedArchive {
    /// Size of the archive in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if the archive has no bytes (never true for a built archive).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// BLAKE3 hex digest of the archive bytes.
    #[must_use]
    pub fn digest(&self) -> String {
        blake3::hash(&self.bytes).to_hex().to_string()
    }
}

fn non_alphanumeric() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^a-zA-Z0-9]").expect("static pattern is valid"))
}

/// Format a timestamp the way archive entry names carry it.
#[must_use]
pub fn entry_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// The file name for an archive created at `now`.
///
/// Diagnostic mode uses the fixed debug name. Otherwise the name is
/// `<prefix>_<timestamp>.<extension>`, where every non-alphanumeric
/// character in the timestamp becomes `_`.
#[must_use]
pub fn file_name(export: &ExportConfig, debug: bool, now: DateTime<Utc>) -> String {
    if debug {
        return export.debug_file_name.clone();
    }
    let stamp = entry_timestamp(now);
    let stamp = non_alphanumeric().replace_all(&stamp, "_");
    format!("{}_{}.{}", export.file_prefix, stamp, export.file_extension)
}

fn aes_mode(strength: EncryptionStrength) -> AesMode {
    match strength {
        EncryptionStrength::Aes128 => AesMode::Aes128,
        EncryptionStrength::Aes192 => AesMode::Aes192,
        EncryptionStrength::Aes256 => AesMode::Aes256,
    }
}

/// Encode `snapshot` and `environment` into a zip archive.
///
/// Entries are written one after another. Their names carry the record index
/// and timestamp, so the write order does not matter.
///
/// # Errors
///
/// Returns an error if a record cannot be serialized or the archive cannot be written.
pub fn build_archive(
    snapshot: &Snapshot,
    environment: &EnvironmentSnapshot,
    protection: Option<Protection<'_>>,
) -> Result<Vec<u8>> {
    let base = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let options = match protection {
        Some(p) => base.with_aes_encryption(aes_mode(p.strength), p.password),
        None => base,
    };

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    for (index, record) in snapshot.history.iter().enumerate() {
        let stamp = entry_timestamp(record.timestamp());
        zip.start_file(format!("history/{index}_{stamp}.json"), options)?;
        zip.write_all(record.to_json()?.as_bytes())?;
    }

    for (index, record) in snapshot.errors.iter().enumerate() {
        let stamp = entry_timestamp(record.timestamp());
        zip.start_file(format!("errors/{index}_{stamp}.json"), options)?;
        zip.write_all(record.to_json()?.as_bytes())?;
    }

    zip.start_file("user.json", options)?;
    zip.write_all(serde_json::to_string(environment)?.as_bytes())?;

    Ok(zip.finish()?.into_inner())
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use chrono::TimeZone;
    use serde_json::json;

    use super::*;
    use crate::record::{ErrorRecord, HistoryRecord};

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap()
    }

    fn sample_snapshot() -> Snapshot {
        Snapshot {
            errors: vec![
                ErrorRecord::new("crash", Some("first".to_string())),
                ErrorRecord::new("crash", Some("second".to_string())),
            ],
            history: vec![HistoryRecord::new("click", None)],
        }
    }

    fn open(bytes: Vec<u8>) -> zip::ZipArchive<Cursor<Vec<u8>>> {
        zip::ZipArchive::new(Cursor::new(bytes)).expect("valid zip")
    }

    #[test]
    fn test_entry_timestamp_format() {
        assert_eq!(entry_timestamp(fixed_time()), "2024-05-01T09:30:00.000Z");
    }

    #[test]
    fn test_file_name_normal_mode() {
        let name = file_name(&ExportConfig::default(), false, fixed_time());
        assert_eq!(name, "MyErrorReport_2024_05_01T09_30_00_000Z.errorReport");
    }

    #[test]
    fn test_file_name_debug_mode() {
        let name = file_name(&ExportConfig::default(), true, fixed_time());
        assert_eq!(name, "debug.zip");
    }

    #[test]
    fn test_layout() {
        let snapshot = sample_snapshot();
        let bytes = build_archive(&snapshot, &EnvironmentSnapshot::new(), None).unwrap();
        let archive = open(bytes);

        let mut names: Vec<&str> = archive.file_names().collect();
        names.sort_unstable();

        let expected_history = format!(
            "history/0_{}.json",
            entry_timestamp(snapshot.history[0].timestamp())
        );
        let expected_error = format!(
            "errors/1_{}.json",
            entry_timestamp(snapshot.errors[1].timestamp())
        );

        assert_eq!(names.len(), 4);
        assert!(names.contains(&expected_history.as_str()));
        assert!(names.contains(&expected_error.as_str()));
        assert!(names.contains(&"user.json"));
        assert_eq!(names.iter().filter(|n| n.starts_with("errors/")).count(), 2);
    }

    #[test]
    fn test_entries_hold_record_json() {
        let snapshot = sample_snapshot();
        let bytes = build_archive(&snapshot, &EnvironmentSnapshot::new(), None).unwrap();
        let mut archive = open(bytes);

        let name = format!(
            "errors/0_{}.json",
            entry_timestamp(snapshot.errors[0].timestamp())
        );
        let mut contents = String::new();
        archive
            .by_name(&name)
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();

        assert_eq!(ErrorRecord::from_json(&contents).unwrap(), snapshot.errors[0]);
    }

    #[test]
    fn test_user_json_holds_environment() {
        let mut environment = EnvironmentSnapshot::new();
        environment.insert("locale".to_string(), json!("en_US.UTF-8"));

        let bytes = build_archive(&Snapshot::default(), &environment, None).unwrap();
        let mut archive = open(bytes);

        let mut contents = String::new();
        archive
            .by_name("user.json")
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, r#"{"locale":"en_US.UTF-8"}"#);
    }

    #[test]
    fn test_empty_snapshot_only_has_user_json() {
        let bytes = build_archive(&Snapshot::default(), &EnvironmentSnapshot::new(), None).unwrap();
        let archive = open(bytes);
        assert_eq!(archive.file_names().collect::<Vec<_>>(), vec!["user.json"]);
    }

    #[test]
    fn test_protected_entries_are_encrypted() {
        let protection = Protection {
            password: "correct horse",
            strength: EncryptionStrength::Aes256,
        };
        let bytes = build_archive(
            &sample_snapshot(),
            &EnvironmentSnapshot::new(),
            Some(protection),
        )
        .unwrap();
        let mut archive = open(bytes);

        assert_eq!(archive.len(), 4);
        for index in 0..archive.len() {
            assert!(archive.by_index_raw(index).unwrap().encrypted());
        }
        assert!(archive.by_name("user.json").is_err());
    }

    #[test]
    fn test_digest_is_stable() {
        let archive = ExportedArchive {
            file_name: "debug.zip".to_string(),
            bytes: b"archive".to_vec(),
            saved_to: None,
        };
        assert_eq!(archive.digest(), blake3::hash(b"archive").to_hex().to_string());
        assert_eq!(archive.len(), 7);
        assert!(!archive.is_empty());
    }
}
