//! Catalog import preparation.
//!
//! Raw import records are normalized into [`Track`]s: the genre list is cut
//! down to its primary genre, the language is normalized to a short code and,
//! when requested, tracks without audio features get estimated ones.
//!
//! Estimates start from a per-genre profile, are nudged by keywords in the
//! title, then receive a small random jitter so tracks of the same genre do
//! not collapse onto a single point.

use crate::track::{normalize_language, primary_genre, FeatureVector, Track, TrackRecord};
use anyhow::{Context, Result};
use rand::{Rng, RngCore};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Half-width of the uniform jitter added to each estimated feature.
pub const JITTER: f64 = 0.05;

/// Genre profiles, matched by substring against the lowercased genre in this order.
const GENRE_PROFILES: &[(&str, [f64; 3])] = &[
    ("pop", [0.7, 0.7, 0.7]),
    ("rock", [0.8, 0.5, 0.5]),
    ("hip hop", [0.7, 0.6, 0.8]),
    ("rap", [0.8, 0.5, 0.8]),
    ("jazz", [0.4, 0.6, 0.5]),
    ("classical", [0.2, 0.5, 0.1]),
    ("electronic", [0.8, 0.7, 0.8]),
    ("dance", [0.9, 0.8, 0.9]),
    ("r&b", [0.5, 0.6, 0.6]),
    ("indie", [0.6, 0.5, 0.5]),
    ("folk", [0.3, 0.5, 0.4]),
    ("metal", [0.9, 0.3, 0.4]),
    ("punk", [0.9, 0.4, 0.6]),
    ("country", [0.5, 0.6, 0.6]),
    ("reggae", [0.6, 0.8, 0.7]),
    ("blues", [0.4, 0.4, 0.5]),
    ("soundtrack", [0.5, 0.5, 0.3]),
    ("lo-fi", [0.3, 0.5, 0.4]),
    ("romantic", [0.4, 0.7, 0.5]),
    ("sad", [0.2, 0.2, 0.2]),
    ("party", [0.9, 0.9, 0.9]),
];

/// Title keywords and the (energy, valence, danceability) shift each applies.
const TITLE_MODIFIERS: &[(&str, [f64; 3])] = &[
    ("remix", [0.2, 0.0, 0.2]),
    ("acoustic", [-0.3, 0.0, -0.2]),
    ("live", [0.1, 0.0, 0.0]),
    ("slow", [-0.3, 0.0, -0.3]),
    ("love", [0.0, 0.2, 0.0]),
    ("sad", [-0.2, -0.4, 0.0]),
    ("happy", [0.2, 0.4, 0.0]),
];

/// Deterministic part of the estimate: genre profile plus title modifiers.
#[must_use]
pub fn base_features(genre: &str, title: &str) -> FeatureVector {
    let genre = genre.trim().to_lowercase();
    let title = title.to_lowercase();

    let mut features = GENRE_PROFILES
        .iter()
        .find(|(key, _)| genre.contains(key))
        .map_or(FeatureVector::NEUTRAL.as_array(), |(_, profile)| *profile);

    for (_, shift) in TITLE_MODIFIERS.iter().filter(|(key, _)| title.contains(key)) {
        for (feature, delta) in features.iter_mut().zip(shift) {
            *feature = (*feature + delta).clamp(0.0, 1.0);
        }
    }

    FeatureVector::new(features[0], features[1], features[2])
}

/// Full estimate: [`base_features`] with jitter, clamped and rounded to two decimals.
pub fn estimate_features<R: Rng + ?Sized>(genre: &str, title: &str, rng: &mut R) -> FeatureVector {
    let mut features = base_features(genre, title).as_array();
    for feature in &mut features {
        let jittered = (*feature + rng.gen_range(-JITTER..=JITTER)).clamp(0.0, 1.0);
        *feature = (jittered * 100.0).round() / 100.0;
    }
    FeatureVector::new(features[0], features[1], features[2])
}

/// Fill in features for a record that has none. Returns whether it was changed.
///
/// Records carrying any usable feature are left alone; their missing
/// components default to neutral on conversion instead.
pub fn fill_missing<R: Rng + ?Sized>(record: &mut TrackRecord, rng: &mut R) -> bool {
    if !record.lacks_features() {
        return false;
    }

    let genre = record.genre.as_deref().unwrap_or("unknown");
    let title = record.title.as_deref().unwrap_or_default();
    let features = estimate_features(genre, title, rng);
    log::trace!("Estimated {features} for `{title}'");

    record.energy = Some(Value::from(features.energy));
    record.valence = Some(Value::from(features.valence));
    record.danceability = Some(Value::from(features.danceability));
    true
}

/// Read a JSON array of track records.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a JSON array of objects.
pub fn read_records(path: &Path) -> Result<Vec<TrackRecord>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog file {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("{} is not a JSON array of tracks", path.display()))
}

/// Normalize import records into catalog tracks.
///
/// Records without an id get their 1-based position. With `enrich`, records
/// lacking every feature receive estimated ones. Returns the tracks and the
/// number of records that were enriched.
pub fn prepare_catalog(
    records: Vec<TrackRecord>,
    mut enrich: Option<&mut dyn RngCore>,
) -> (Vec<Track>, usize) {
    let mut enriched = 0;
    let tracks = records
        .into_iter()
        .enumerate()
        .map(|(index, mut record)| {
            if record.id.is_none() {
                record.id = Some(Value::from(index + 1));
            }
            if let Some(rng) = enrich.as_deref_mut() {
                if fill_missing(&mut record, rng) {
                    enriched += 1;
                }
            }

            let genres = record.genre.take().unwrap_or_default();
            record.language = Some(normalize_language(record.language.as_deref(), &genres));
            record.genre = Some(primary_genre(&genres));
            Track::from(record)
        })
        .collect();

    (tracks, enriched)
}
