//! Track scoring for recommendations.
//!
//! Two scoring functions share one similarity measure:
//!
//! - [`seed_score`] rates a candidate against a seed track (smart queue).
//! - [`taste_score`] rates a candidate against a taste vector (made-for-you mix).
//!
//! Both are pure. Ranking goes through [`rank_descending`], which is a stable
//! sort: equal scores keep catalog order, so output is deterministic for a
//! given catalog ordering.

use crate::track::{vector_of, FeatureVector, Track};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Point weights for scoring a candidate against a seed track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedWeights {
    /// Multiplier on cosine similarity.
    pub similarity: f64,
    pub exact_genre: f64,
    /// One genre string contains the other.
    pub partial_genre: f64,
    pub language: f64,
    /// Subtracted when the energy gap exceeds `energy_jump_threshold`.
    pub energy_jump_penalty: f64,
    pub energy_jump_threshold: f64,
}

impl Default for SeedWeights {
    fn default() -> Self {
        Self {
            similarity: 50.0,
            exact_genre: 30.0,
            partial_genre: 15.0,
            language: 20.0,
            energy_jump_penalty: 15.0,
            energy_jump_threshold: 0.3,
        }
    }
}

/// Weights for scoring a candidate against the listener's taste.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TasteWeights {
    pub similarity: f64,
    pub followed_artist: f64,
    /// Multiplier on play count normalized by the catalog maximum.
    pub popularity: f64,
    pub liked: f64,
}

impl Default for TasteWeights {
    fn default() -> Self {
        Self {
            similarity: 0.5,
            followed_artist: 0.3,
            popularity: 0.2,
            liked: 0.1,
        }
    }
}

/// Cosine similarity in `[-1, 1]`.
///
/// Zero-magnitude input carries no similarity signal and yields `0.0`.
///
/// ```
/// use melody::algorithm::cosine_similarity;
/// use melody::track::FeatureVector;
///
/// let v = FeatureVector::new(0.2, 0.4, 0.9);
/// assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-12);
/// assert_eq!(cosine_similarity(&FeatureVector::new(0.0, 0.0, 0.0), &v), 0.0);
/// ```
#[must_use]
pub fn cosine_similarity(a: &FeatureVector, b: &FeatureVector) -> f64 {
    let magnitudes = a.magnitude() * b.magnitude();
    if magnitudes == 0.0 || !magnitudes.is_finite() {
        return 0.0;
    }
    (a.dot(b) / magnitudes).clamp(-1.0, 1.0)
}

/// How closely two genre strings match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenreMatch {
    Exact,
    /// One genre is a substring of the other.
    Partial,
    None,
}

#[must_use]
pub fn genre_match(candidate: &str, seed: &str) -> GenreMatch {
    match candidate == seed {
        true => GenreMatch::Exact,
        false if candidate.contains(seed) || seed.contains(candidate) => GenreMatch::Partial,
        false => GenreMatch::None,
    }
}

/// Composite score of `candidate` as a follow-up to `seed`.
#[must_use]
pub fn seed_score(candidate: &Track, seed: &Track, weights: &SeedWeights) -> f64 {
    let candidate_vector = vector_of(candidate);
    let seed_vector = vector_of(seed);

    let similarity = cosine_similarity(&seed_vector, &candidate_vector) * weights.similarity;

    let genre = match genre_match(&candidate.genre, &seed.genre) {
        GenreMatch::Exact => weights.exact_genre,
        GenreMatch::Partial => weights.partial_genre,
        GenreMatch::None => 0.0,
    };

    let language = match candidate.language == seed.language {
        true => weights.language,
        false => 0.0,
    };

    let continuity = match (candidate_vector.energy - seed_vector.energy).abs() > weights.energy_jump_threshold {
        true => -weights.energy_jump_penalty,
        false => 0.0,
    };

    let score = similarity + genre + language + continuity;
    log::trace!("Seed score {score:.3} for `{}' after `{}'", candidate.id, seed.id);
    score
}

/// Listener signals consulted by [`taste_score`].
#[derive(Debug, Clone, Copy)]
pub struct TasteSignals<'a> {
    pub taste: FeatureVector,
    pub followed_artists: &'a HashSet<String>,
    pub liked: &'a HashSet<String>,
    /// Highest play count in the catalog, floored at 1.
    pub max_play_count: u64,
}

/// Highest play count in `catalog`, never below 1.
#[must_use]
pub fn max_play_count(catalog: &[Track]) -> u64 {
    catalog.iter().map(|track| track.play_count).max().unwrap_or(0).max(1)
}

/// Personalized score of `candidate` given the listener's signals.
///
/// Artist affinity is exact string equality: a co-billed track whose artist
/// field is `"A, B"` does not match a follow of `"A"`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn taste_score(candidate: &Track, signals: &TasteSignals<'_>, weights: &TasteWeights) -> f64 {
    let similarity = cosine_similarity(&signals.taste, &vector_of(candidate)) * weights.similarity;

    let artist = match signals.followed_artists.contains(&candidate.artist) {
        true => weights.followed_artist,
        false => 0.0,
    };

    let popularity =
        candidate.play_count as f64 / signals.max_play_count.max(1) as f64 * weights.popularity;

    let liked = match signals.liked.contains(&candidate.id) {
        true => weights.liked,
        false => 0.0,
    };

    similarity + artist + popularity + liked
}

/// Score every track in parallel. Output order matches input order.
pub fn score_all<'a, F>(candidates: &[&'a Track], score: F) -> Vec<(&'a Track, f64)>
where
    F: Fn(&Track) -> f64 + Sync,
{
    candidates
        .par_iter()
        .map(|track| (*track, score(track)))
        .collect()
}

/// Sort by score, highest first. Stable: ties keep their input order.
#[must_use]
pub fn rank_descending<T>(mut scored: Vec<(T, f64)>) -> Vec<(T, f64)> {
    scored.sort_by(|(_, a), (_, b)| b.partial_cmp(a).unwrap_or(Ordering::Equal));
    scored
}

/// Default number of generic recommendations.
pub const DEFAULT_RECOMMENDATION_LIMIT: usize = 10;

/// Rank `candidates` by similarity to `user_vector` alone and keep the top `limit`.
#[must_use]
pub fn recommend<'a>(user_vector: &FeatureVector, candidates: &'a [Track], limit: usize) -> Vec<&'a Track> {
    let refs: Vec<&Track> = candidates.iter().collect();
    let scored = score_all(&refs, |track| cosine_similarity(user_vector, &vector_of(track)));

    rank_descending(scored)
        .into_iter()
        .take(limit)
        .map(|(track, _)| track)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn track(id: &str, genre: &str, language: &str, energy: f64) -> Track {
        Track::new(id, id, "Artist", genre, language).with_features(energy, 0.5, 0.5)
    }

    #[test]
    fn test_cosine_identical_vectors() {
        let v = FeatureVector::new(0.3, 0.7, 0.1);
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_cosine_zero_vector_has_no_signal() {
        let zero = FeatureVector::new(0.0, 0.0, 0.0);
        let v = FeatureVector::new(0.3, 0.7, 0.1);
        assert_eq!(cosine_similarity(&zero, &v), 0.0);
        assert_eq!(cosine_similarity(&v, &zero), 0.0);
        assert_eq!(cosine_similarity(&zero, &zero), 0.0);
    }

    #[test]
    fn test_genre_match_tiers() {
        assert_eq!(genre_match("rock", "rock"), GenreMatch::Exact);
        assert_eq!(genre_match("rock-alt", "rock"), GenreMatch::Partial);
        assert_eq!(genre_match("pop", "hindi pop"), GenreMatch::Partial);
        assert_eq!(genre_match("jazz", "rock"), GenreMatch::None);
    }

    #[test]
    fn test_exact_genre_beats_partial() {
        let seed = track("seed", "rock", "en", 0.5);
        let exact = track("a", "rock", "en", 0.5);
        let partial = track("b", "rock-alt", "en", 0.5);
        let weights = SeedWeights::default();

        let exact_score = seed_score(&exact, &seed, &weights);
        let partial_score = seed_score(&partial, &seed, &weights);
        assert!((exact_score - partial_score - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_energy_penalty_is_a_threshold() {
        let seed = track("seed", "pop", "en", 0.5);
        let weights = SeedWeights::default();
        let near = seed_score(&track("a", "jazz", "fr", 0.75), &seed, &weights);
        let far = seed_score(&track("b", "jazz", "fr", 0.85), &seed, &weights);
        assert!(near > 0.0);
        assert!(far < near - 14.0, "crossing the threshold costs the full penalty");
    }

    #[test]
    fn test_taste_score_components() {
        let followed: HashSet<String> = ["Artist".to_string()].into();
        let liked: HashSet<String> = ["a".to_string()].into();
        let signals = TasteSignals {
            taste: FeatureVector::NEUTRAL,
            followed_artists: &followed,
            liked: &liked,
            max_play_count: 10,
        };
        let candidate = track("a", "pop", "en", 0.5).with_play_count(5);
        let score = taste_score(&candidate, &signals, &TasteWeights::default());
        assert!((score - (0.5 + 0.3 + 0.1 + 0.1)).abs() < 1e-9);
    }

    #[test]
    fn test_co_billed_artist_does_not_match_follow() {
        let followed: HashSet<String> = ["A".to_string()].into();
        let liked = HashSet::new();
        let signals = TasteSignals {
            taste: FeatureVector::NEUTRAL,
            followed_artists: &followed,
            liked: &liked,
            max_play_count: 1,
        };
        let solo = Track::new("1", "t", "A", "pop", "en");
        let duet = Track::new("2", "t", "A, B", "pop", "en");
        let weights = TasteWeights::default();
        assert!(taste_score(&solo, &signals, &weights) > taste_score(&duet, &signals, &weights));
    }

    #[test]
    fn test_max_play_count_floor() {
        assert_eq!(max_play_count(&[]), 1);
        assert_eq!(max_play_count(&[track("a", "pop", "en", 0.5)]), 1);
        assert_eq!(max_play_count(&[track("a", "pop", "en", 0.5).with_play_count(42)]), 42);
    }

    #[test]
    fn test_rank_is_stable() {
        let ranked = rank_descending(vec![("a", 1.0), ("b", 2.0), ("c", 1.0), ("d", 2.0)]);
        let order: Vec<_> = ranked.into_iter().map(|(id, _)| id).collect();
        assert_eq!(order, vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn test_recommend_orders_by_similarity() {
        let catalog = vec![
            track("far", "pop", "en", 0.0).with_features(0.0, 0.0, 1.0),
            track("near", "pop", "en", 0.9).with_features(0.9, 0.9, 0.9),
            track("mid", "pop", "en", 0.5).with_features(0.9, 0.2, 0.4),
        ];
        let user = FeatureVector::new(0.8, 0.8, 0.8);
        let ids: Vec<_> = recommend(&user, &catalog, 2).iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid"]);
    }

    proptest! {
        #[test]
        fn prop_cosine_self_similarity(e in 0.01f64..1.0, v in 0.0f64..1.0, d in 0.0f64..1.0) {
            let vector = FeatureVector::new(e, v, d);
            prop_assert!((cosine_similarity(&vector, &vector) - 1.0).abs() < 1e-9);
        }

        #[test]
        fn prop_cosine_bounded_and_symmetric(
            a in proptest::array::uniform3(0.0f64..1.0),
            b in proptest::array::uniform3(0.0f64..1.0),
        ) {
            let x = FeatureVector::new(a[0], a[1], a[2]);
            let y = FeatureVector::new(b[0], b[1], b[2]);
            let forward = cosine_similarity(&x, &y);
            prop_assert!((-1.0..=1.0).contains(&forward));
            prop_assert!((forward - cosine_similarity(&y, &x)).abs() < 1e-12);
        }
    }
}
