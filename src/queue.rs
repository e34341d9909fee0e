//! # Queue Generation
//!
//! Two strategies turn the catalog plus listener state into an ordered list of
//! tracks:
//!
//! - [`SmartQueueStrategy`]: seeded radio. Ranks the catalog by how well each
//!   track follows the seed (vector similarity, genre, language, energy
//!   continuity) and skips anything played recently.
//! - [`MadeForYouStrategy`]: unseeded personal mix. Ranks the catalog against
//!   the aggregate taste vector, followed artists, popularity and likes.
//!
//! Both are pure functions of their inputs and rank with a stable sort, so a
//! given catalog ordering always produces the same queue. Neither strategy
//! falls back to randomness; the seeded random pick used when the smart queue
//! comes up empty lives in [`random_fallback`], with an injected RNG.

use crate::algorithm::{self, SeedWeights, TasteSignals, TasteWeights};
use crate::profile::aggregate_taste;
use crate::track::Track;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Length and window settings shared by the generators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum number of tracks a generator returns.
    pub queue_length: usize,
    /// History entries excluded from the smart queue.
    pub exclusion_window: usize,
    /// History entries excluded from the made-for-you mix.
    pub mix_exclusion_window: usize,
    /// The live queue is refilled once it holds this many tracks or fewer.
    pub regenerate_at: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            queue_length: 20,
            exclusion_window: 50,
            mix_exclusion_window: 20,
            regenerate_at: 1,
        }
    }
}

/// A generated entry together with the score that placed it.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedTrack {
    pub track: Track,
    pub score: f64,
}

impl std::fmt::Display for QueuedTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (score: {:.3})", self.track, self.score)
    }
}

/// Everything a generator may read about the listener.
#[derive(Debug, Clone, Copy)]
pub struct RecommendationContext<'a> {
    pub catalog: &'a [Track],
    /// Playback history, oldest first.
    pub history: &'a [&'a Track],
    pub liked: &'a HashSet<String>,
    pub followed_artists: &'a HashSet<String>,
}

impl<'a> RecommendationContext<'a> {
    /// Ids of the last `window` history entries.
    #[must_use]
    pub fn recent_ids(&self, window: usize) -> HashSet<&'a str> {
        let skip = self.history.len().saturating_sub(window);
        self.history[skip..].iter().map(|track| track.id.as_str()).collect()
    }

    /// Catalog entries that are liked, in catalog order.
    #[must_use]
    pub fn liked_tracks(&self) -> Vec<&'a Track> {
        self.catalog
            .iter()
            .filter(|track| self.liked.contains(&track.id))
            .collect()
    }

    /// True when there is no history, no like and no follow.
    #[must_use]
    pub fn is_cold_start(&self) -> bool {
        self.history.is_empty() && self.liked.is_empty() && self.followed_artists.is_empty()
    }
}

/// Queue generation strategy.
pub trait QueueStrategy {
    /// Generate ranked tracks. `seed` is ignored by unseeded strategies.
    fn generate(&self, seed: Option<&Track>, context: &RecommendationContext<'_>) -> Vec<QueuedTrack>;
}

/// Catalog entries that pass `keep`, first occurrence of each id only.
fn candidates<'a>(catalog: &'a [Track], keep: impl Fn(&Track) -> bool) -> Vec<&'a Track> {
    let mut seen = HashSet::new();
    catalog
        .iter()
        .filter(|track| keep(track))
        .filter(|track| seen.insert(track.id.clone()))
        .collect()
}

fn top(scored: Vec<(&Track, f64)>, length: usize) -> Vec<QueuedTrack> {
    algorithm::rank_descending(scored)
        .into_iter()
        .take(length)
        .map(|(track, score)| QueuedTrack {
            track: track.clone(),
            score,
        })
        .collect()
}

/// Seeded smart queue.
#[derive(Debug, Clone, Default)]
pub struct SmartQueueStrategy {
    weights: SeedWeights,
    config: QueueConfig,
}

impl SmartQueueStrategy {
    #[must_use]
    pub fn new(weights: SeedWeights, config: QueueConfig) -> Self {
        Self { weights, config }
    }
}

impl QueueStrategy for SmartQueueStrategy {
    fn generate(&self, seed: Option<&Track>, context: &RecommendationContext<'_>) -> Vec<QueuedTrack> {
        let Some(seed) = seed else {
            return Vec::new();
        };

        let excluded = context.recent_ids(self.config.exclusion_window);
        let pool = candidates(context.catalog, |track| {
            track.id != seed.id && !excluded.contains(track.id.as_str())
        });

        let scored = algorithm::score_all(&pool, |track| algorithm::seed_score(track, seed, &self.weights));
        let queue = top(scored, self.config.queue_length);

        log::debug!(
            "Smart queue from `{}': {} of {} candidates kept",
            seed.id,
            queue.len(),
            pool.len()
        );
        log_queue_diversity(&queue);
        queue
    }
}

/// Unseeded made-for-you mix.
#[derive(Debug, Clone, Default)]
pub struct MadeForYouStrategy {
    weights: TasteWeights,
    config: QueueConfig,
}

impl MadeForYouStrategy {
    #[must_use]
    pub fn new(weights: TasteWeights, config: QueueConfig) -> Self {
        Self { weights, config }
    }
}

impl QueueStrategy for MadeForYouStrategy {
    fn generate(&self, _seed: Option<&Track>, context: &RecommendationContext<'_>) -> Vec<QueuedTrack> {
        if context.is_cold_start() {
            log::debug!("Made-for-you mix skipped: no history, likes or follows");
            return Vec::new();
        }

        let liked_tracks = context.liked_tracks();
        let taste = aggregate_taste(context.history, &liked_tracks);
        let signals = TasteSignals {
            taste,
            followed_artists: context.followed_artists,
            liked: context.liked,
            max_play_count: algorithm::max_play_count(context.catalog),
        };

        let excluded = context.recent_ids(self.config.mix_exclusion_window);
        let pool = candidates(context.catalog, |track| !excluded.contains(track.id.as_str()));

        let scored = algorithm::score_all(&pool, |track| algorithm::taste_score(track, &signals, &self.weights));
        let mix = top(scored, self.config.queue_length);

        log::debug!("Made-for-you mix for taste {taste}: {} tracks", mix.len());
        mix
    }
}

/// Uniform random pick from the catalog, excluding only `current`.
///
/// Used when the smart queue has no candidates left. Returns `None` when the
/// catalog holds nothing but the current track.
pub fn random_fallback<R: Rng + ?Sized>(
    catalog: &[Track],
    current: Option<&Track>,
    rng: &mut R,
) -> Option<Track> {
    let pool = candidates(catalog, |track| current.map_or(true, |c| c.id != track.id));
    pool.choose(rng).map(|track| (*track).clone())
}

/// Warn when a generated queue is dominated by a few artists.
fn log_queue_diversity(queue: &[QueuedTrack]) {
    if queue.len() < 5 {
        return;
    }
    let unique_artists: HashSet<_> = queue.iter().map(|entry| &entry.track.artist).collect();
    #[allow(clippy::cast_precision_loss)]
    let diversity_ratio = unique_artists.len() as f64 / queue.len() as f64;

    if diversity_ratio < 0.3 {
        log::warn!("Queue diversity is low: {diversity_ratio:.2} unique artists per track");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn track(id: &str, genre: &str, energy: f64) -> Track {
        Track::new(id, id, &format!("Artist {id}"), genre, "en").with_features(energy, 0.5, 0.5)
    }

    fn ids(queue: &[QueuedTrack]) -> Vec<&str> {
        queue.iter().map(|entry| entry.track.id.as_str()).collect()
    }

    struct Fixture {
        catalog: Vec<Track>,
        liked: HashSet<String>,
        followed: HashSet<String>,
    }

    impl Fixture {
        fn new(catalog: Vec<Track>) -> Self {
            Self {
                catalog,
                liked: HashSet::new(),
                followed: HashSet::new(),
            }
        }

        fn context<'a>(&'a self, history: &'a [&'a Track]) -> RecommendationContext<'a> {
            RecommendationContext {
                catalog: &self.catalog,
                history,
                liked: &self.liked,
                followed_artists: &self.followed,
            }
        }
    }

    #[test]
    fn test_smart_queue_continuity_scenario() {
        let fixture = Fixture::new(vec![
            track("A", "pop", 0.8),
            track("B", "pop", 0.75),
            track("C", "rock", 0.2),
            track("D", "pop", 0.1),
            track("E", "pop", 0.7),
        ]);
        let seed = fixture.catalog[0].clone();
        let queue = SmartQueueStrategy::default().generate(Some(&seed), &fixture.context(&[]));
        let order = ids(&queue);

        assert!(!order.contains(&"A"), "seed never follows itself");
        let position = |id| order.iter().position(|x| *x == id).unwrap();
        assert!(position("B") < position("D"));
        assert!(position("D") < position("C"));
    }

    #[test]
    fn test_smart_queue_excludes_recent_history() {
        let fixture = Fixture::new((0..80).map(|i| track(&i.to_string(), "pop", 0.5)).collect());
        let history: Vec<&Track> = fixture.catalog[1..61].iter().collect();
        let seed = fixture.catalog[0].clone();

        let queue = SmartQueueStrategy::default().generate(Some(&seed), &fixture.context(&history));
        let excluded: HashSet<&str> = history[10..].iter().map(|t| t.id.as_str()).collect();

        assert_eq!(queue.len(), 20);
        assert!(queue.iter().all(|entry| !excluded.contains(entry.track.id.as_str())));
        // 1..=10 fell out of the 50-entry window and come first by catalog order.
        assert_eq!(&ids(&queue)[..3], &["1", "2", "3"]);
    }

    #[test]
    fn test_smart_queue_ties_keep_catalog_order() {
        let fixture = Fixture::new(vec![
            track("s", "pop", 0.5),
            track("x", "pop", 0.5),
            track("y", "pop", 0.5),
            track("z", "pop", 0.5),
        ]);
        let seed = fixture.catalog[0].clone();
        let queue = SmartQueueStrategy::default().generate(Some(&seed), &fixture.context(&[]));
        assert_eq!(ids(&queue), vec!["x", "y", "z"]);
    }

    #[test]
    fn test_smart_queue_deduplicates_catalog_ids() {
        let fixture = Fixture::new(vec![track("s", "pop", 0.5), track("x", "pop", 0.5), track("x", "pop", 0.5)]);
        let seed = fixture.catalog[0].clone();
        let queue = SmartQueueStrategy::default().generate(Some(&seed), &fixture.context(&[]));
        assert_eq!(ids(&queue), vec!["x"]);
    }

    #[test]
    fn test_smart_queue_without_seed_is_empty() {
        let fixture = Fixture::new(vec![track("a", "pop", 0.5)]);
        assert!(SmartQueueStrategy::default().generate(None, &fixture.context(&[])).is_empty());
    }

    #[test]
    fn test_made_for_you_cold_start_is_empty() {
        let fixture = Fixture::new((0..5).map(|i| track(&i.to_string(), "pop", 0.5)).collect());
        let mix = MadeForYouStrategy::default().generate(None, &fixture.context(&[]));
        assert!(mix.is_empty());
    }

    #[test]
    fn test_made_for_you_is_bounded_and_sorted() {
        let mut fixture = Fixture::new(
            (0..40)
                .map(|i| track(&i.to_string(), "pop", f64::from(i) / 40.0))
                .collect(),
        );
        fixture.followed.insert("Artist 3".to_string());
        let history: Vec<&Track> = fixture.catalog[30..35].iter().collect();

        let mix = MadeForYouStrategy::default().generate(None, &fixture.context(&history));
        assert_eq!(mix.len(), 20);
        assert!(mix.windows(2).all(|pair| pair[0].score >= pair[1].score));
        assert!(mix.iter().all(|entry| !history.iter().any(|h| h.id == entry.track.id)));
        assert_eq!(mix[0].track.id, "3", "followed artist outranks everything else");
    }

    #[test]
    fn test_made_for_you_follow_only_is_not_cold() {
        let mut fixture = Fixture::new(vec![track("a", "pop", 0.5), track("b", "rock", 0.5)]);
        fixture.followed.insert("Artist b".to_string());
        let mix = MadeForYouStrategy::default().generate(None, &fixture.context(&[]));
        assert_eq!(ids(&mix), vec!["b", "a"]);
    }

    #[test]
    fn test_made_for_you_boosts_liked() {
        let mut fixture = Fixture::new(vec![track("a", "pop", 0.5), track("b", "pop", 0.5)]);
        fixture.liked.insert("b".to_string());
        let mix = MadeForYouStrategy::default().generate(None, &fixture.context(&[]));
        assert_eq!(ids(&mix), vec!["b", "a"]);
        assert!((mix[0].score - mix[1].score - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_random_fallback_is_reproducible() {
        let catalog: Vec<Track> = (0..10).map(|i| track(&i.to_string(), "pop", 0.5)).collect();
        let current = catalog[0].clone();

        let first = random_fallback(&catalog, Some(&current), &mut StdRng::seed_from_u64(7));
        let second = random_fallback(&catalog, Some(&current), &mut StdRng::seed_from_u64(7));
        assert_eq!(first, second);
        assert!(first.is_some_and(|t| t.id != "0"));
    }

    #[test]
    fn test_random_fallback_single_track_catalog() {
        let catalog = vec![track("only", "pop", 0.5)];
        let mut rng = StdRng::seed_from_u64(1);
        assert!(random_fallback(&catalog, Some(&catalog[0]), &mut rng).is_none());
    }
}
