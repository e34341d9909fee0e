//! # Player Session
//!
//! The player is a reducer: a [`PlayerSession`] owns all mutable listening
//! state ([`SessionState`]) and applies one [`PlayerEvent`] at a time.
//!
//! ## Event Semantics
//!
//! | event            | effect                                                        |
//! |------------------|---------------------------------------------------------------|
//! | `Play(t)`        | `t` is current: toggle pause. Otherwise current goes to history, `t` starts |
//! | `TrackEnded`     | completion counted (weight 2), then advance                   |
//! | `Skip` / `Next`  | advance, nothing extra counted                                |
//! | `Previous`       | last history entry starts, current goes back to the queue front; empty history seeks to 0 |
//! | `TogglePlayback` | pause or resume                                               |
//! | `Enqueue(t)`     | append to the live queue                                      |
//! | `ToggleLike(id)` | flip a liked track id                                         |
//! | `ToggleFollow(a)`| flip a followed artist                                        |
//! | `Seek(s)`        | forwarded to the output                                       |
//!
//! Every track that starts playing counts as a play with weight 1.
//!
//! ## Advancing
//!
//! 1. The current track moves to history.
//! 2. When the live queue holds `regenerate_at` tracks or fewer, a smart queue
//!    seeded from the queue front (or the track that just played) is appended.
//! 3. The queue front starts playing.
//! 4. With nothing queued, a random catalog track other than the one that just
//!    played starts instead. With nothing at all to play, the session stays on
//!    the current track, paused.
//!
//! State is always updated before the [`AudioOutput`] is called, so an output
//! failure never leaves the session half-applied.

use crate::config::RecommenderConfig;
use crate::playback::AudioOutput;
use crate::profile::{aggregate_taste, HistoryLog, TasteProfile, TASTE_WINDOW};
use crate::queue::{
    random_fallback, MadeForYouStrategy, QueueStrategy, QueuedTrack, RecommendationContext,
    SmartQueueStrategy,
};
use crate::track::{FeatureVector, Track};
use anyhow::{Context, Result};
use log::{debug, info};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::fs;
use std::path::Path;

/// Genre affinity added when a track starts.
pub const START_WEIGHT: f64 = 1.0;

/// Genre affinity added when a track plays to its end.
pub const COMPLETION_WEIGHT: f64 = 2.0;

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    Play(Track),
    TogglePlayback,
    TrackEnded,
    Skip,
    Next,
    Previous,
    Enqueue(Track),
    ToggleLike(String),
    ToggleFollow(String),
    Seek(f64),
}

/// What an event changed, for callers that mirror it elsewhere.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Started(Track),
    Paused,
    Resumed,
    Seeked(f64),
    /// Queue length after the append.
    Queued(usize),
    Liked { track_id: String, liked: bool },
    Following { artist: String, following: bool },
    Unchanged,
}

/// Everything the session remembers between events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionState {
    pub current: Option<Track>,
    pub is_playing: bool,
    pub queue: VecDeque<Track>,
    pub history: HistoryLog,
    pub profile: TasteProfile,
    pub liked: BTreeSet<String>,
    pub followed_artists: BTreeSet<String>,
}

impl SessionState {
    /// Empty state whose history keeps `history_capacity` entries.
    #[must_use]
    pub fn with_history_capacity(history_capacity: usize) -> Self {
        Self {
            history: HistoryLog::with_capacity(history_capacity),
            ..Self::default()
        }
    }

    /// Load a saved session. A missing file yields `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read session from {}", path.display()))?;
        let state = serde_json::from_str(&text)
            .with_context(|| format!("Corrupt session file {}", path.display()))?;
        Ok(Some(state))
    }

    /// Write the session as JSON, replacing any previous file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self).context("Failed to serialize session")?;
        let temp = path.with_extension("json.tmp");
        fs::write(&temp, text)
            .with_context(|| format!("Failed to write session to {}", temp.display()))?;
        fs::rename(&temp, path)
            .with_context(|| format!("Failed to replace session file {}", path.display()))?;
        Ok(())
    }
}

/// One listener, one device, one live queue.
pub struct PlayerSession<O, R> {
    state: SessionState,
    catalog: Vec<Track>,
    config: RecommenderConfig,
    output: O,
    rng: R,
}

impl<O: AudioOutput, R: Rng> PlayerSession<O, R> {
    /// Fresh session over `catalog`.
    pub fn new(catalog: Vec<Track>, config: RecommenderConfig, output: O, rng: R) -> Self {
        let state = SessionState::with_history_capacity(config.effective_history_capacity());
        Self::with_state(state, catalog, config, output, rng)
    }

    /// Resume a saved session. Its history grows to cover the configured windows.
    pub fn with_state(
        mut state: SessionState,
        catalog: Vec<Track>,
        config: RecommenderConfig,
        output: O,
        rng: R,
    ) -> Self {
        state.history.ensure_capacity(config.effective_history_capacity());
        Self {
            state,
            catalog,
            config,
            output,
            rng,
        }
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    #[must_use]
    pub fn into_state(self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn catalog(&self) -> &[Track] {
        &self.catalog
    }

    #[must_use]
    pub fn output(&self) -> &O {
        &self.output
    }

    #[must_use]
    pub fn current(&self) -> Option<&Track> {
        self.state.current.as_ref()
    }

    /// Replace the liked and followed mirrors, e.g. from a persistent library.
    pub fn set_library(&mut self, liked: BTreeSet<String>, followed_artists: BTreeSet<String>) {
        self.state.liked = liked;
        self.state.followed_artists = followed_artists;
    }

    /// Apply one event.
    ///
    /// # Errors
    ///
    /// Only fails when the audio output does; the state change is kept.
    pub fn dispatch(&mut self, event: PlayerEvent) -> Result<Outcome> {
        debug!("Dispatching {event:?}");
        match event {
            PlayerEvent::Play(track) => self.play(track),
            PlayerEvent::TogglePlayback => self.toggle_playback(),
            PlayerEvent::TrackEnded => {
                if let Some(track) = self.state.current.as_ref() {
                    self.state.profile.record_play(track, COMPLETION_WEIGHT);
                }
                self.advance()
            }
            PlayerEvent::Skip | PlayerEvent::Next => self.advance(),
            PlayerEvent::Previous => self.previous(),
            PlayerEvent::Enqueue(track) => {
                info!("Queued {track}");
                self.state.queue.push_back(track);
                Ok(Outcome::Queued(self.state.queue.len()))
            }
            PlayerEvent::ToggleLike(track_id) => {
                let liked = !self.state.liked.remove(&track_id);
                if liked {
                    self.state.liked.insert(track_id.clone());
                }
                Ok(Outcome::Liked { track_id, liked })
            }
            PlayerEvent::ToggleFollow(artist) => {
                let following = !self.state.followed_artists.remove(&artist);
                if following {
                    self.state.followed_artists.insert(artist.clone());
                }
                Ok(Outcome::Following { artist, following })
            }
            PlayerEvent::Seek(seconds) => {
                if self.state.current.is_none() {
                    return Ok(Outcome::Unchanged);
                }
                self.output.seek(seconds)?;
                Ok(Outcome::Seeked(seconds))
            }
        }
    }

    /// Current taste vector from the recent history.
    #[must_use]
    pub fn taste(&self) -> FeatureVector {
        let history = self.state.history.recent(TASTE_WINDOW);
        aggregate_taste(&history, &[])
    }

    /// Preview the smart queue for `seed` without touching the live queue.
    #[must_use]
    pub fn smart_queue(&self, seed: &Track) -> Vec<QueuedTrack> {
        let strategy = SmartQueueStrategy::new(self.config.seed_weights, self.config.queue);
        self.generate(&strategy, Some(seed))
    }

    /// The made-for-you mix for the current listening state.
    #[must_use]
    pub fn made_for_you(&self) -> Vec<QueuedTrack> {
        let strategy = MadeForYouStrategy::new(self.config.taste_weights, self.config.queue);
        self.generate(&strategy, None)
    }

    fn generate(&self, strategy: &dyn QueueStrategy, seed: Option<&Track>) -> Vec<QueuedTrack> {
        let history: Vec<&Track> = self.state.history.iter().collect();
        let liked: HashSet<String> = self.state.liked.iter().cloned().collect();
        let followed: HashSet<String> = self.state.followed_artists.iter().cloned().collect();
        let context = RecommendationContext {
            catalog: &self.catalog,
            history: &history,
            liked: &liked,
            followed_artists: &followed,
        };
        strategy.generate(seed, &context)
    }

    fn play(&mut self, track: Track) -> Result<Outcome> {
        if self.state.current.as_ref().is_some_and(|current| current.id == track.id) {
            return self.toggle_playback();
        }
        if let Some(previous) = self.state.current.take() {
            self.state.history.push(previous);
        }
        self.start(track)
    }

    fn start(&mut self, track: Track) -> Result<Outcome> {
        self.state.profile.record_play(&track, START_WEIGHT);
        self.state.current = Some(track.clone());
        self.state.is_playing = true;

        self.output.load(&track)?;
        self.output.play()?;
        Ok(Outcome::Started(track))
    }

    fn toggle_playback(&mut self) -> Result<Outcome> {
        if self.state.current.is_none() {
            return Ok(Outcome::Unchanged);
        }
        self.state.is_playing = !self.state.is_playing;

        if self.state.is_playing {
            self.output.play()?;
            Ok(Outcome::Resumed)
        } else {
            self.output.pause()?;
            Ok(Outcome::Paused)
        }
    }

    fn advance(&mut self) -> Result<Outcome> {
        let previous = self.state.current.take();
        if let Some(track) = &previous {
            self.state.history.push(track.clone());
        }

        if self.state.queue.len() <= self.config.queue.regenerate_at {
            self.refill_queue(previous.as_ref());
        }

        let next = match self.state.queue.pop_front() {
            Some(track) => Some(track),
            None => {
                let pick = random_fallback(&self.catalog, previous.as_ref(), &mut self.rng);
                if let Some(track) = &pick {
                    debug!("Smart queue exhausted, picked {track} at random");
                }
                pick
            }
        };

        if let Some(track) = next {
            return self.start(track);
        }

        info!("Nothing left to play");
        if previous.is_some() {
            self.state.history.pop_last();
        }
        self.state.current = previous;
        self.state.is_playing = false;
        if self.state.current.is_some() {
            self.output.pause()?;
        }
        Ok(Outcome::Unchanged)
    }

    fn refill_queue(&mut self, previous: Option<&Track>) {
        let Some(seed) = self.state.queue.front().or(previous).cloned() else {
            return;
        };

        let generated = self.smart_queue(&seed);
        let queued: HashSet<String> = self.state.queue.iter().map(|track| track.id.clone()).collect();
        let before = self.state.queue.len();
        self.state.queue.extend(
            generated
                .into_iter()
                .map(|entry| entry.track)
                .filter(|track| !queued.contains(&track.id)),
        );
        debug!(
            "Queue refilled from {seed}: {} new tracks",
            self.state.queue.len() - before
        );
    }

    fn previous(&mut self) -> Result<Outcome> {
        match self.state.history.pop_last() {
            Some(track) => {
                if let Some(current) = self.state.current.take() {
                    self.state.queue.push_front(current);
                }
                self.start(track)
            }
            None if self.state.current.is_some() => {
                self.output.seek(0.0)?;
                Ok(Outcome::Seeked(0.0))
            }
            None => Ok(Outcome::Unchanged),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::{NullOutput, OutputCall};
    use anyhow::bail;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::TempDir;

    type TestSession = PlayerSession<NullOutput, StdRng>;

    fn track(id: &str, genre: &str, energy: f64) -> Track {
        Track::new(id, id, &format!("Artist {id}"), genre, "en").with_features(energy, 0.5, 0.5)
    }

    fn session(catalog: Vec<Track>) -> TestSession {
        PlayerSession::new(
            catalog,
            RecommenderConfig::default(),
            NullOutput::default(),
            StdRng::seed_from_u64(11),
        )
    }

    fn catalog(n: usize) -> Vec<Track> {
        (0..n)
            .map(|i| {
                #[allow(clippy::cast_precision_loss)]
                let energy = i as f64 / n as f64;
                track(&i.to_string(), "pop", energy)
            })
            .collect()
    }

    fn current_id(session: &TestSession) -> Option<&str> {
        session.current().map(|track| track.id.as_str())
    }

    #[test]
    fn test_start_then_completion_counts_three() -> Result<()> {
        let mut catalog = catalog(5);
        catalog.push(track("x", "lo-fi", 0.3));
        let x = catalog[5].clone();
        let mut session = session(catalog);

        session.dispatch(PlayerEvent::Play(x))?;
        session.dispatch(PlayerEvent::TrackEnded)?;

        let profile = &session.state().profile;
        assert_eq!(profile.affinity("lo-fi"), 3.0);
        assert_eq!(profile.play_count("x"), 2);
        assert_eq!(session.state().history.last().map(|t| t.id.as_str()), Some("x"));
        Ok(())
    }

    #[test]
    fn test_skip_is_not_penalized() -> Result<()> {
        let mut catalog = catalog(5);
        catalog.push(track("x", "lo-fi", 0.3));
        let x = catalog[5].clone();
        let mut session = session(catalog);

        session.dispatch(PlayerEvent::Play(x))?;
        session.dispatch(PlayerEvent::Skip)?;

        assert_eq!(session.state().profile.affinity("lo-fi"), 1.0);
        assert_eq!(session.state().profile.play_count("x"), 1);
        assert_ne!(current_id(&session), Some("x"));
        Ok(())
    }

    #[test]
    fn test_next_regenerates_from_current() -> Result<()> {
        let catalog = catalog(30);
        let seed = catalog[0].clone();
        let mut session = session(catalog);
        session.dispatch(PlayerEvent::Play(seed.clone()))?;

        let expected = session.smart_queue(&seed);
        let outcome = session.dispatch(PlayerEvent::Next)?;

        assert_eq!(outcome, Outcome::Started(expected[0].track.clone()));
        assert_eq!(session.state().queue.len(), 19);
        assert!(session.state().queue.iter().all(|t| t.id != "0"));
        Ok(())
    }

    #[test]
    fn test_enqueued_track_plays_first() -> Result<()> {
        let catalog = catalog(10);
        let (first, queued) = (catalog[0].clone(), catalog[7].clone());
        let mut session = session(catalog);

        session.dispatch(PlayerEvent::Play(first))?;
        assert_eq!(session.dispatch(PlayerEvent::Enqueue(queued))?, Outcome::Queued(1));
        session.dispatch(PlayerEvent::Next)?;

        assert_eq!(current_id(&session), Some("7"));
        assert!(!session.state().queue.is_empty());
        assert!(session.state().queue.iter().all(|t| t.id != "7" && t.id != "0"));
        Ok(())
    }

    #[test]
    fn test_exhausted_queue_falls_back_to_random() -> Result<()> {
        let catalog = vec![track("a", "pop", 0.5), track("b", "pop", 0.5)];
        let a = catalog[0].clone();
        let mut session = session(catalog);

        session.dispatch(PlayerEvent::Play(a))?;
        session.dispatch(PlayerEvent::Next)?;
        assert_eq!(current_id(&session), Some("b"));

        // a and b are both in the exclusion window now
        session.dispatch(PlayerEvent::Next)?;
        assert_eq!(current_id(&session), Some("a"));
        Ok(())
    }

    #[test]
    fn test_single_track_catalog_advance_is_noop() -> Result<()> {
        let only = track("only", "pop", 0.5);
        let mut session = session(vec![only.clone()]);

        session.dispatch(PlayerEvent::Play(only))?;
        let outcome = session.dispatch(PlayerEvent::Next)?;

        assert_eq!(outcome, Outcome::Unchanged);
        assert_eq!(current_id(&session), Some("only"));
        assert!(!session.state().is_playing);
        assert!(session.state().history.is_empty());
        assert_eq!(session.output().calls.last(), Some(&OutputCall::Pause));
        Ok(())
    }

    #[test]
    fn test_previous_requeues_current() -> Result<()> {
        let catalog = catalog(4);
        let (a, b) = (catalog[0].clone(), catalog[1].clone());
        let mut session = session(catalog);

        session.dispatch(PlayerEvent::Play(a))?;
        session.dispatch(PlayerEvent::Play(b))?;
        session.dispatch(PlayerEvent::Previous)?;

        assert_eq!(current_id(&session), Some("0"));
        assert_eq!(session.state().queue.front().map(|t| t.id.as_str()), Some("1"));
        assert!(session.state().history.is_empty());

        assert_eq!(session.dispatch(PlayerEvent::Previous)?, Outcome::Seeked(0.0));
        assert_eq!(session.output().calls.last(), Some(&OutputCall::Seek(0.0)));
        Ok(())
    }

    #[test]
    fn test_play_current_toggles_pause() -> Result<()> {
        let a = track("a", "pop", 0.5);
        let mut session = session(vec![a.clone()]);

        session.dispatch(PlayerEvent::Play(a.clone()))?;
        assert_eq!(session.dispatch(PlayerEvent::Play(a))?, Outcome::Paused);
        assert!(!session.state().is_playing);
        assert_eq!(session.state().profile.play_count("a"), 1);

        assert_eq!(session.dispatch(PlayerEvent::TogglePlayback)?, Outcome::Resumed);
        assert!(session.state().is_playing);
        Ok(())
    }

    #[test]
    fn test_like_and_follow_toggle() -> Result<()> {
        let mut session = session(catalog(3));

        let outcome = session.dispatch(PlayerEvent::ToggleLike("1".to_string()))?;
        assert_eq!(outcome, Outcome::Liked { track_id: "1".to_string(), liked: true });
        session.dispatch(PlayerEvent::ToggleLike("1".to_string()))?;
        assert!(session.state().liked.is_empty());

        session.dispatch(PlayerEvent::ToggleFollow("Artist 2".to_string()))?;
        assert!(session.state().followed_artists.contains("Artist 2"));
        assert_eq!(session.made_for_you()[0].track.id, "2");
        Ok(())
    }

    #[test]
    fn test_made_for_you_follows_listening() -> Result<()> {
        let catalog = catalog(30);
        let (first, second) = (catalog[0].clone(), catalog[1].clone());
        let mut session = session(catalog);

        // the playing track only reaches history once something replaces it
        session.dispatch(PlayerEvent::Play(first))?;
        assert!(session.made_for_you().is_empty());

        session.dispatch(PlayerEvent::Play(second))?;
        let mix = session.made_for_you();
        assert_eq!(mix.len(), 20);
        assert!(mix.iter().all(|entry| entry.track.id != "0"));
        Ok(())
    }

    #[test]
    fn test_restored_session_covers_a_wider_exclusion_window() -> Result<()> {
        let catalog = catalog(300);
        let mut config = RecommenderConfig::default();
        config.queue.exclusion_window = 280;

        let mut session = PlayerSession::with_state(
            SessionState::with_history_capacity(200),
            catalog.clone(),
            config,
            NullOutput::default(),
            StdRng::seed_from_u64(3),
        );
        assert_eq!(session.state().history.capacity(), 280);

        for track in &catalog[..261] {
            session.dispatch(PlayerEvent::Play(track.clone()))?;
        }
        assert_eq!(session.state().history.len(), 260);

        let queue = session.smart_queue(&catalog[260]);
        assert!(!queue.is_empty());
        assert!(queue.iter().all(|entry| entry.track.id.parse::<usize>().is_ok_and(|id| id > 260)));
        Ok(())
    }

    struct BrokenOutput;

    impl AudioOutput for BrokenOutput {
        fn load(&mut self, _track: &Track) -> Result<()> {
            bail!("device unplugged")
        }
        fn play(&mut self) -> Result<()> {
            bail!("device unplugged")
        }
        fn pause(&mut self) -> Result<()> {
            bail!("device unplugged")
        }
        fn seek(&mut self, _seconds: f64) -> Result<()> {
            bail!("device unplugged")
        }
    }

    #[test]
    fn test_output_failure_keeps_state() {
        let a = track("a", "jazz", 0.5);
        let mut session = PlayerSession::new(
            vec![a.clone()],
            RecommenderConfig::default(),
            BrokenOutput,
            StdRng::seed_from_u64(0),
        );

        assert!(session.dispatch(PlayerEvent::Play(a)).is_err());
        assert_eq!(session.current().map(|t| t.id.as_str()), Some("a"));
        assert_eq!(session.state().profile.affinity("jazz"), 1.0);
    }

    #[test]
    fn test_state_survives_save_and_load() -> Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("session.json");
        assert!(SessionState::load(&path)?.is_none());

        let catalog = catalog(10);
        let first = catalog[0].clone();
        let mut session = session(catalog);
        session.dispatch(PlayerEvent::Play(first))?;
        session.dispatch(PlayerEvent::TrackEnded)?;
        session.dispatch(PlayerEvent::ToggleLike("3".to_string()))?;

        let state = session.into_state();
        state.save(&path)?;
        assert_eq!(SessionState::load(&path)?, Some(state));
        Ok(())
    }
}
