//! # Configuration Module
//!
//! Data directory layout and tuning settings for Melody.
//!
//! ## Data Storage
//!
//! Everything lives in one directory, by default the platform data directory:
//! - Linux: `~/.local/share/melody/`
//! - macOS: `~/Library/Application Support/melody/`
//! - Windows: `%APPDATA%\melody\`
//!
//! The directory can be moved with `--data-dir` or `MELODY_DATA_DIR`.
//!
//! | file           | contents                                     |
//! |----------------|----------------------------------------------|
//! | `melody.db`    | catalog, likes, follows, playlists (SQLite)  |
//! | `session.json` | player session: current track, queue, history, taste |
//! | `config.json`  | optional [`Settings`]                        |
//!
//! ## Settings File
//!
//! Every field is optional; anything left out keeps its default:
//!
//! ```json
//! {
//!   "audio_backend": "mpc",
//!   "recommender": {
//!     "seed_weights": { "exact_genre": 40.0 },
//!     "queue": { "queue_length": 30 },
//!     "history_capacity": 500
//!   }
//! }
//! ```

use crate::algorithm::{SeedWeights, TasteWeights};
use crate::playback::AudioBackend;
use crate::profile::DEFAULT_HISTORY_CAPACITY;
use crate::queue::QueueConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const DATA_DIR_NAME: &str = "melody";
const DB_FILE: &str = "melody.db";
const SESSION_FILE: &str = "session.json";
const CONFIG_FILE: &str = "config.json";

/// Returns the Melody data directory, creating it if needed.
///
/// `override_dir` wins over the platform data directory.
///
/// # Errors
///
/// This function will return an error if:
/// - No override is given and the system data directory cannot be determined
/// - The directory cannot be created due to permissions
pub fn get_data_dir(override_dir: Option<&Path>) -> Result<PathBuf> {
    let dir = match override_dir {
        Some(dir) => dir.to_path_buf(),
        None => dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!(
                "Could not determine system data directory. Use --data-dir or MELODY_DATA_DIR."
            ))?
            .join(DATA_DIR_NAME),
    };

    fs::create_dir_all(&dir).with_context(|| {
        format!(
            "Failed to create Melody data directory at {}. Please check file permissions.",
            dir.display()
        )
    })?;

    Ok(dir)
}

/// Tuning for scoring and queue generation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommenderConfig {
    pub seed_weights: SeedWeights,
    pub taste_weights: TasteWeights,
    pub queue: QueueConfig,
    /// History entries kept; raised to the exclusion window if smaller.
    pub history_capacity: usize,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            seed_weights: SeedWeights::default(),
            taste_weights: TasteWeights::default(),
            queue: QueueConfig::default(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

impl RecommenderConfig {
    /// Effective history capacity: large enough for every window that reads it.
    #[must_use]
    pub fn effective_history_capacity(&self) -> usize {
        self.history_capacity
            .max(self.queue.exclusion_window)
            .max(self.queue.mix_exclusion_window)
    }
}

/// Contents of `config.json`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub audio_backend: AudioBackend,
    pub recommender: RecommenderConfig,
}

impl Settings {
    /// Load settings from `path`. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Invalid settings file {}", path.display()))
    }
}

/// Resolved paths and settings for one run of the command-line player.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub session_path: PathBuf,
    pub settings: Settings,
}

impl RuntimeConfig {
    /// Resolve the data directory and load its settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be created or the
    /// settings file is malformed.
    pub fn load(override_dir: Option<&Path>) -> Result<Self> {
        let data_dir = get_data_dir(override_dir)?;
        let settings = Settings::load(&data_dir.join(CONFIG_FILE))?;

        Ok(Self {
            db_path: data_dir.join(DB_FILE),
            session_path: data_dir.join(SESSION_FILE),
            data_dir,
            settings,
        })
    }
}
