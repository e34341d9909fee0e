//! # Taste Profile
//!
//! Listening state the recommenders learn from:
//!
//! - [`HistoryLog`]: playback order, capped so only a recent suffix is kept
//! - [`TasteProfile`]: per-genre affinity and per-track play counts
//! - [`aggregate_taste`]: recency-weighted average of the recent history
//!
//! ## Behavior Tracking
//!
//! Mirrors how a play is counted by the player session:
//!
//! - **Start**: `record_play(track, 1)` when playback of a new track begins
//! - **Completion**: `record_play(track, 2)` when a track plays to its end
//! - **Skip**: nothing is recorded, skipping is not penalized
//!
//! A track that is played through therefore adds 3 to its genre's affinity and
//! 2 to its own play count.

use crate::track::{vector_of, FeatureVector, Track};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Number of most recent history entries the taste vector is built from.
pub const TASTE_WINDOW: usize = 20;

/// Smallest history capacity that still covers the smart-queue exclusion window.
pub const MIN_HISTORY_CAPACITY: usize = 50;

/// Default history capacity.
pub const DEFAULT_HISTORY_CAPACITY: usize = 200;

/// Append-only playback history with a fixed capacity.
///
/// Oldest entries are dropped once the capacity is reached. The capacity is
/// never below [`MIN_HISTORY_CAPACITY`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredHistory")]
pub struct HistoryLog {
    capacity: usize,
    entries: VecDeque<Track>,
}

/// Saved shape of a [`HistoryLog`], validated on load.
#[derive(Deserialize)]
struct StoredHistory {
    #[serde(default = "default_capacity")]
    capacity: usize,
    #[serde(default)]
    entries: VecDeque<Track>,
}

fn default_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

impl From<StoredHistory> for HistoryLog {
    fn from(stored: StoredHistory) -> Self {
        let mut history = Self::with_capacity(stored.capacity);
        history.entries = stored.entries;
        history.truncate();
        history
    }
}

impl HistoryLog {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_HISTORY_CAPACITY);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, track: Track) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(track);
    }

    /// Raise the capacity to at least `capacity`. Never shrinks.
    pub fn ensure_capacity(&mut self, capacity: usize) {
        if capacity > self.capacity {
            self.capacity = capacity;
        }
    }

    /// Drop the oldest entries beyond the capacity.
    fn truncate(&mut self) {
        let excess = self.entries.len().saturating_sub(self.capacity);
        self.entries.drain(..excess);
    }

    /// Remove and return the most recent entry.
    pub fn pop_last(&mut self) -> Option<Track> {
        self.entries.pop_back()
    }

    /// The last `n` entries, oldest first.
    #[must_use]
    pub fn recent(&self, n: usize) -> Vec<&Track> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).collect()
    }

    #[must_use]
    pub fn last(&self) -> Option<&Track> {
        self.entries.back()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for HistoryLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

/// Genre affinity and per-track play counts.
///
/// Only positive weights are ever added, so both maps are non-decreasing until
/// an external [`TasteProfile::reset`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TasteProfile {
    pub genre_affinity: BTreeMap<String, f64>,
    pub play_counts: BTreeMap<String, u64>,
}

impl TasteProfile {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `weight` to the track's genre affinity and count one play.
    pub fn record_play(&mut self, track: &Track, weight: f64) {
        *self.genre_affinity.entry(track.genre.clone()).or_insert(0.0) += weight;
        *self.play_counts.entry(track.id.clone()).or_insert(0) += 1;
        log::debug!(
            "Recorded play of `{}' (genre `{}' +{weight})",
            track.id,
            track.genre
        );
    }

    #[must_use]
    pub fn affinity(&self, genre: &str) -> f64 {
        self.genre_affinity.get(genre).copied().unwrap_or(0.0)
    }

    #[must_use]
    pub fn play_count(&self, track_id: &str) -> u64 {
        self.play_counts.get(track_id).copied().unwrap_or(0)
    }

    /// Genres by descending affinity; ties in alphabetical order.
    #[must_use]
    pub fn top_genres(&self, limit: usize) -> Vec<(&str, f64)> {
        let mut genres: Vec<(&str, f64)> = self
            .genre_affinity
            .iter()
            .map(|(genre, score)| (genre.as_str(), *score))
            .collect();
        genres.sort_by(|(_, a), (_, b)| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
        genres.truncate(limit);
        genres
    }

    pub fn reset(&mut self) {
        self.genre_affinity.clear();
        self.play_counts.clear();
    }
}

/// Fold the recent history into a single taste vector.
///
/// The last [`TASTE_WINDOW`] entries are averaged with linear recency weights
/// `1 + i / TASTE_WINDOW`, `i` counting from the oldest entry of the window.
/// Liked tracks are accepted but do not contribute to the vector.
///
/// Cold start (nothing in the history window) yields [`FeatureVector::NEUTRAL`].
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn aggregate_taste(history: &[&Track], _liked: &[&Track]) -> FeatureVector {
    let skip = history.len().saturating_sub(TASTE_WINDOW);
    let window = &history[skip..];

    if window.is_empty() {
        return FeatureVector::NEUTRAL;
    }

    let (sums, total_weight) = window.iter().enumerate().fold(
        ([0.0_f64; 3], 0.0_f64),
        |(mut sums, total), (i, track)| {
            let weight = 1.0 + i as f64 / TASTE_WINDOW as f64;
            let features = vector_of(track).as_array();
            for (sum, feature) in sums.iter_mut().zip(features) {
                *sum += feature * weight;
            }
            (sums, total + weight)
        },
    );

    FeatureVector::new(
        sums[0] / total_weight,
        sums[1] / total_weight,
        sums[2] / total_weight,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn track(id: &str, genre: &str, energy: f64) -> Track {
        Track::new(id, id, "Artist", genre, "en").with_features(energy, 0.25, 0.75)
    }

    #[test]
    fn test_cold_start_is_neutral() {
        assert_eq!(aggregate_taste(&[], &[]), FeatureVector::NEUTRAL);
    }

    #[test]
    fn test_likes_without_history_stay_neutral() {
        let liked = track("x", "pop", 0.9);
        assert_eq!(aggregate_taste(&[], &[&liked]), FeatureVector::NEUTRAL);
    }

    #[test]
    fn test_identical_history_is_invariant() {
        let t = track("a", "pop", 0.8);
        let history: Vec<&Track> = std::iter::repeat(&t).take(13).collect();
        let taste = aggregate_taste(&history, &[]);
        assert!((taste.energy - 0.8).abs() < 1e-12);
        assert!((taste.valence - 0.25).abs() < 1e-12);
        assert!((taste.danceability - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_recent_entries_weigh_more() {
        let old = track("old", "pop", 0.0);
        let new = track("new", "pop", 1.0);
        let taste = aggregate_taste(&[&old, &new], &[]);
        // weights 1.0 and 1.05
        assert!((taste.energy - 1.05 / 2.05).abs() < 1e-12);
    }

    #[test]
    fn test_only_last_twenty_count() {
        let ignored = track("ignored", "pop", 0.0);
        let kept = track("kept", "pop", 0.6);
        let mut history: Vec<&Track> = vec![&ignored; 5];
        history.extend(std::iter::repeat(&kept).take(TASTE_WINDOW));
        assert!((aggregate_taste(&history, &[]).energy - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_start_plus_completion() {
        let mut profile = TasteProfile::new();
        let x = track("x", "lo-fi", 0.3);
        profile.record_play(&x, 1.0);
        profile.record_play(&x, 2.0);
        assert_eq!(profile.affinity("lo-fi"), 3.0);
        assert_eq!(profile.play_count("x"), 2);
        assert_eq!(profile.affinity("rock"), 0.0);
    }

    #[test]
    fn test_top_genres() {
        let mut profile = TasteProfile::new();
        profile.record_play(&track("a", "pop", 0.5), 1.0);
        profile.record_play(&track("b", "rock", 0.5), 3.0);
        profile.record_play(&track("c", "jazz", 0.5), 1.0);
        assert_eq!(profile.top_genres(2), vec![("rock", 3.0), ("jazz", 1.0)]);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut history = HistoryLog::with_capacity(10);
        assert_eq!(history.capacity(), MIN_HISTORY_CAPACITY);

        for i in 0..60 {
            history.push(track(&i.to_string(), "pop", 0.5));
        }
        assert_eq!(history.len(), MIN_HISTORY_CAPACITY);
        assert_eq!(history.iter().next().map(|t| t.id.as_str()), Some("10"));

        let recent: Vec<_> = history.recent(3).iter().map(|t| t.id.clone()).collect();
        assert_eq!(recent, vec!["57", "58", "59"]);
        assert_eq!(history.pop_last().map(|t| t.id), Some("59".to_string()));
    }

    #[test]
    fn test_ensure_capacity_only_grows() {
        let mut history = HistoryLog::with_capacity(60);
        history.ensure_capacity(300);
        assert_eq!(history.capacity(), 300);
        history.ensure_capacity(80);
        assert_eq!(history.capacity(), 300);

        for i in 0..250 {
            history.push(track(&i.to_string(), "pop", 0.5));
        }
        assert_eq!(history.len(), 250);
    }

    #[test]
    fn test_loaded_history_respects_its_capacity() {
        let entries: Vec<Track> = (0..70).map(|i| track(&i.to_string(), "pop", 0.5)).collect();
        let json = serde_json::json!({ "capacity": 3, "entries": entries });

        let mut history: HistoryLog = serde_json::from_value(json).unwrap();
        assert_eq!(history.capacity(), MIN_HISTORY_CAPACITY);
        assert_eq!(history.len(), MIN_HISTORY_CAPACITY);
        assert_eq!(history.iter().next().map(|t| t.id.as_str()), Some("20"));

        history.push(track("new", "pop", 0.5));
        assert_eq!(history.len(), MIN_HISTORY_CAPACITY);
        assert_eq!(history.last().map(|t| t.id.as_str()), Some("new"));
    }

    proptest! {
        #[test]
        fn prop_taste_stays_in_unit_cube(energies in proptest::collection::vec(0.0f64..=1.0, 1..40)) {
            let tracks: Vec<Track> = energies
                .iter()
                .enumerate()
                .map(|(i, e)| track(&i.to_string(), "pop", *e))
                .collect();
            let history: Vec<&Track> = tracks.iter().collect();
            let taste = aggregate_taste(&history, &[]);
            prop_assert!(taste.energy >= -1e-12 && taste.energy <= 1.0 + 1e-12);
        }
    }
}
