use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::models::{AppRecord, RecordDefaults};

/// Whole-record persistence.
///
/// There are no partial updates and no version check: `save` overwrites
/// whatever is stored. Callers that need read-modify-write atomicity must
/// serialize access themselves.
pub trait Store: Send {
    /// The stored record, or `None` when nothing has been persisted yet.
    fn fetch(&self) -> Result<Option<AppRecord>>;

    fn save(&self, record: &AppRecord) -> Result<()>;

    /// Return the stored record, creating and persisting a default one if absent.
    fn load(&self, defaults: &RecordDefaults) -> Result<AppRecord> {
        if let Some(record) = self.fetch()? {
            return Ok(record);
        }
        let record = AppRecord::new(defaults);
        self.save(&record)?;
        tracing::info!("initialized new record");
        Ok(record)
    }
}

impl<S: Store + ?Sized> Store for Box<S> {
    fn fetch(&self) -> Result<Option<AppRecord>> {
        (**self).fetch()
    }

    fn save(&self, record: &AppRecord) -> Result<()> {
        (**self).save(record)
    }
}

/// Record kept as a single pretty-printed JSON file.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl Store for FileStore {
    fn fetch(&self) -> Result<Option<AppRecord>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read {}", self.path.display()));
            }
        };
        let record = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;
        Ok(Some(record))
    }

    fn save(&self, record: &AppRecord) -> Result<()> {
        let json = serde_json::to_string_pretty(record).context("failed to serialize record")?;
        let tmp = self.temp_path();
        std::fs::write(&tmp, json)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    use crate::models::FeedingEvent;

    #[test]
    fn test_fetch_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("data.json"));
        assert!(store.fetch().unwrap().is_none());
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        let store = FileStore::new(&path);

        let record = store.load(&RecordDefaults::default()).unwrap();
        assert_eq!(record, AppRecord::new(&RecordDefaults::default()));
        assert!(path.exists());
        assert!(!store.temp_path().exists());

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"dailyLimit\": 50.0"));
    }

    #[test]
    fn test_load_uses_custom_defaults_only_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("data.json"));
        let custom = RecordDefaults {
            daily_limit: 65.0,
            ..RecordDefaults::default()
        };
        store.load(&custom).unwrap();

        let later = store.load(&RecordDefaults::default()).unwrap();
        assert!((later.daily_limit - 65.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_save_overwrites_whole_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("data.json"));
        let mut record = store.load(&RecordDefaults::default()).unwrap();

        let at = Utc.with_ymd_and_hms(2024, 6, 15, 9, 0, 0).unwrap();
        record.push_feeding(FeedingEvent::at(at, 810.0, 795.0));
        record.password_hash = Some("hash".to_string());
        store.save(&record).unwrap();

        let reread = FileStore::new(store.path()).fetch().unwrap().unwrap();
        assert_eq!(reread, record);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, "{ not json").unwrap();
        let store = FileStore::new(&path);

        let err = store.load(&RecordDefaults::default()).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse"));
        // The broken file is left alone rather than reset
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
    }
}
