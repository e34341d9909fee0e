//! # Track Model
//!
//! Catalog records and the three-dimensional feature vector every scoring
//! routine works on.
//!
//! Records arrive from collaborators in a loose shape ([`TrackRecord`]): any
//! feature may be missing, `null`, a numeric string or garbage. Conversion into
//! a [`Track`] coerces every feature into `[0, 1]`, so the rest of the crate
//! never has to deal with undefined features.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Value used for any feature that is absent or not a number.
pub const DEFAULT_FEATURE: f64 = 0.5;

/// The (energy, valence, danceability) triple.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub energy: f64,
    pub valence: f64,
    pub danceability: f64,
}

impl FeatureVector {
    /// Cold-start taste: all three features at the default.
    pub const NEUTRAL: Self = Self::new(DEFAULT_FEATURE, DEFAULT_FEATURE, DEFAULT_FEATURE);

    #[must_use]
    pub const fn new(energy: f64, valence: f64, danceability: f64) -> Self {
        Self { energy, valence, danceability }
    }

    /// Build a vector from optional raw components, defaulting each one independently.
    #[must_use]
    pub fn from_raw(energy: Option<f64>, valence: Option<f64>, danceability: Option<f64>) -> Self {
        Self::new(
            coerce_feature(energy),
            coerce_feature(valence),
            coerce_feature(danceability),
        )
    }

    #[must_use]
    pub const fn as_array(&self) -> [f64; 3] {
        [self.energy, self.valence, self.danceability]
    }

    #[must_use]
    pub fn dot(&self, other: &Self) -> f64 {
        self.as_array()
            .iter()
            .zip(other.as_array().iter())
            .map(|(a, b)| a * b)
            .sum()
    }

    #[must_use]
    pub fn magnitude(&self) -> f64 {
        self.dot(self).sqrt()
    }
}

impl Default for FeatureVector {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

impl std::fmt::Display for FeatureVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "(energy {:.2}, valence {:.2}, danceability {:.2})",
            self.energy, self.valence, self.danceability
        )
    }
}

/// Coerce a raw feature into `[0, 1]`; absent or NaN becomes [`DEFAULT_FEATURE`].
#[must_use]
pub fn coerce_feature(raw: Option<f64>) -> f64 {
    match raw {
        Some(value) if !value.is_nan() => value.clamp(0.0, 1.0),
        _ => DEFAULT_FEATURE,
    }
}

/// A single playable catalog item.
///
/// Deserializes through [`TrackRecord`], so JSON with missing or malformed
/// features still yields a valid track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "TrackRecord")]
pub struct Track {
    pub id: String,
    pub title: String,
    /// Possibly a comma-joined list of co-artists.
    pub artist: String,
    pub album: String,
    /// Primary genre, lowercase.
    pub genre: String,
    /// Normalized short language code (`en`, `hi`, ...).
    pub language: String,
    pub energy: f64,
    pub valence: f64,
    pub danceability: f64,
    /// Catalog-wide popularity.
    pub play_count: u64,
    /// Seconds.
    pub duration: Option<f64>,
    pub url: Option<String>,
    pub cover: Option<String>,
}

impl Track {
    /// Track with neutral features and no media references.
    #[must_use]
    pub fn new(id: &str, title: &str, artist: &str, genre: &str, language: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            artist: artist.to_string(),
            album: String::new(),
            genre: genre.to_string(),
            language: language.to_string(),
            energy: DEFAULT_FEATURE,
            valence: DEFAULT_FEATURE,
            danceability: DEFAULT_FEATURE,
            play_count: 0,
            duration: None,
            url: None,
            cover: None,
        }
    }

    /// Replace the features, coercing each into `[0, 1]`.
    #[must_use]
    pub fn with_features(mut self, energy: f64, valence: f64, danceability: f64) -> Self {
        self.energy = coerce_feature(Some(energy));
        self.valence = coerce_feature(Some(valence));
        self.danceability = coerce_feature(Some(danceability));
        self
    }

    #[must_use]
    pub fn with_play_count(mut self, play_count: u64) -> Self {
        self.play_count = play_count;
        self
    }

    #[must_use]
    pub fn vector(&self) -> FeatureVector {
        vector_of(self)
    }
}

impl std::fmt::Display for Track {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {} [{}]", self.artist, self.title, self.id)
    }
}

/// Feature vector of a track. Total: features are already coerced on the
/// track, and are re-coerced here so hand-built tracks are safe too.
#[must_use]
pub fn vector_of(track: &Track) -> FeatureVector {
    FeatureVector::from_raw(
        Some(track.energy),
        Some(track.valence),
        Some(track.danceability),
    )
}

/// Loose record shape accepted from collaborators and import files.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub energy: Option<Value>,
    #[serde(default)]
    pub valence: Option<Value>,
    #[serde(default)]
    pub danceability: Option<Value>,
    #[serde(default)]
    pub play_count: Option<Value>,
    #[serde(default)]
    pub duration: Option<Value>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub cover: Option<String>,
}

impl TrackRecord {
    /// True when none of the three features carries a usable number.
    #[must_use]
    pub fn lacks_features(&self) -> bool {
        [&self.energy, &self.valence, &self.danceability]
            .iter()
            .all(|value| numeric(value.as_ref()).is_none())
    }
}

impl From<TrackRecord> for Track {
    fn from(record: TrackRecord) -> Self {
        let id = match record.id {
            Some(Value::String(id)) => id,
            Some(Value::Number(id)) => id.to_string(),
            _ => String::new(),
        };
        let play_count = numeric(record.play_count.as_ref())
            .filter(|count| *count >= 0.0)
            .map_or(0, |count| count as u64);

        Self {
            id,
            title: record.title.unwrap_or_default(),
            artist: record.artist.unwrap_or_default(),
            album: record.album.unwrap_or_default(),
            genre: record.genre.unwrap_or_default(),
            language: record.language.unwrap_or_default(),
            energy: coerce_feature(numeric(record.energy.as_ref())),
            valence: coerce_feature(numeric(record.valence.as_ref())),
            danceability: coerce_feature(numeric(record.danceability.as_ref())),
            play_count,
            duration: numeric(record.duration.as_ref()).filter(|d| d.is_finite() && *d >= 0.0),
            url: record.url,
            cover: record.cover,
        }
    }
}

/// Numbers and numeric strings are accepted; everything else is `None`.
fn numeric(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// First entry of a comma-separated genre list, trimmed and lowercased.
///
/// An empty first entry means "pop", even when later entries are present.
#[must_use]
pub fn primary_genre(genres: &str) -> String {
    let first = genres.split(',').next().unwrap_or_default().trim().to_lowercase();
    if first.is_empty() {
        "pop".to_string()
    } else {
        first
    }
}

/// Language names (or codes) matched by substring, checked in order.
const LANGUAGE_CODES: &[(&[&str], &str)] = &[
    (&["hindi"], "hi"),
    (&["punjabi"], "pa"),
    (&["tamil"], "ta"),
    (&["telugu"], "te"),
    (&["bengali", "bangla"], "bn"),
    (&["gujarati"], "gu"),
    (&["spanish"], "es"),
    (&["korean"], "ko"),
];

/// Genre hints for tracks whose language is unknown.
const GENRE_LANGUAGE_HINTS: &[(&[&str], &str)] = &[
    (&["bollywood", "hindi pop"], "hi"),
    (&["punjabi pop", "bhangra"], "pa"),
    (&["tamil pop"], "ta"),
    (&["telugu pop"], "te"),
    (&["gujarati pop"], "gu"),
    (&["bengali pop", "bangla pop"], "bn"),
];

const KNOWN_CODES: &[&str] = &["en", "hi", "pa", "ta", "te", "bn", "gu", "es", "ko"];

/// Normalize a language name or code to a short code.
///
/// Unknown or empty languages are inferred from the genre list; English is the
/// final fallback.
#[must_use]
pub fn normalize_language(language: Option<&str>, genres: &str) -> String {
    let language = language.map(str::trim).unwrap_or_default().to_lowercase();

    if language.is_empty() || language == "unknown" {
        let genre_list: Vec<String> = genres
            .split(',')
            .map(|genre| genre.trim().to_lowercase())
            .collect();
        return GENRE_LANGUAGE_HINTS
            .iter()
            .find(|(hints, _)| hints.iter().any(|hint| genre_list.iter().any(|g| g == hint)))
            .map_or("en", |(_, code)| *code)
            .to_string();
    }

    if KNOWN_CODES.contains(&language.as_str()) {
        return language;
    }

    LANGUAGE_CODES
        .iter()
        .find(|(names, _)| names.iter().any(|name| language.contains(name)))
        .map_or("en", |(_, code)| *code)
        .to_string()
}
