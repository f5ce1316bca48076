use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use std::path::PathBuf;

use kibble_core::models::RecordDefaults;

pub struct Config {
    pub data_dir: PathBuf,
    pub record_path: PathBuf,
    pub db_path: PathBuf,
    pub defaults: RecordDefaults,
}

impl Config {
    /// Resolve paths and record defaults.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `KIBBLE_DATA_DIR` | Directory holding `data.json` / `kibble.db` | platform data dir |
    /// | `KIBBLE_DAILY_LIMIT` | Daily limit (grams) for a newly created record | `50` |
    pub fn load() -> Result<Self> {
        let data_dir = match std::env::var_os("KIBBLE_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => ProjectDirs::from("", "", "kibble")
                .context("Could not determine home directory")?
                .data_dir()
                .to_path_buf(),
        };
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let mut defaults = RecordDefaults::default();
        if let Ok(raw) = std::env::var("KIBBLE_DAILY_LIMIT") {
            defaults.daily_limit = parse_limit(&raw)?;
        }

        Ok(Config {
            record_path: data_dir.join("data.json"),
            db_path: data_dir.join("kibble.db"),
            data_dir,
            defaults,
        })
    }
}

fn parse_limit(raw: &str) -> Result<f64> {
    let grams: f64 = raw
        .trim()
        .parse()
        .with_context(|| format!("Invalid KIBBLE_DAILY_LIMIT '{raw}'. Use a number of grams"))?;
    if !grams.is_finite() || grams <= 0.0 {
        bail!("KIBBLE_DAILY_LIMIT must be greater than 0");
    }
    Ok(grams)
}
