//! Taste-vector recommendations and smart queues for a music streaming catalog.
//!
//! Core modules:
//! - [`track`] - Track records and the (energy, valence, danceability) feature vector
//! - [`algorithm`] - Cosine similarity, seed and taste scoring, stable ranking
//! - [`profile`] - Bounded history, genre affinity, taste aggregation
//! - [`queue`] - Smart queue and made-for-you strategies
//! - [`session`] - The player session reducer
//!
//! ### Supporting Modules
//!
//! - [`library`] - Catalog and listener library interfaces, in-memory implementation
//! - [`db`] - SQLite-backed catalog and library
//! - [`enrich`] - Catalog import normalization and feature estimation
//! - [`playback`] - Audio output interface, `mpc` and null outputs
//! - [`config`] - Data directory and settings
//! - [`cli`], [`commands`], [`completion`] - The `melody` command-line player
//!
//! ## Quick Start Example
//!
//! ```
//! use melody::config::RecommenderConfig;
//! use melody::playback::NullOutput;
//! use melody::session::{Outcome, PlayerEvent, PlayerSession};
//! use melody::track::Track;
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! let catalog = vec![
//!     Track::new("1", "Morning", "Ana", "pop", "en").with_features(0.8, 0.7, 0.7),
//!     Track::new("2", "Noon", "Ana", "pop", "en").with_features(0.75, 0.6, 0.7),
//!     Track::new("3", "Night", "Bo", "jazz", "en").with_features(0.2, 0.4, 0.3),
//! ];
//! let mut session = PlayerSession::new(
//!     catalog.clone(),
//!     RecommenderConfig::default(),
//!     NullOutput::default(),
//!     StdRng::seed_from_u64(1),
//! );
//!
//! session.dispatch(PlayerEvent::Play(catalog[0].clone()))?;
//! // finished: counted as a completed listen, then the smart queue picks the follow-up
//! let outcome = session.dispatch(PlayerEvent::TrackEnded)?;
//! assert_eq!(outcome, Outcome::Started(catalog[1].clone()));
//! assert_eq!(session.state().profile.affinity("pop"), 4.0);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Scoring
//!
//! ### Smart Queue (seeded)
//! - Cosine similarity to the seed × 50
//! - +30 exact genre, else +15 when one genre contains the other
//! - +20 same language
//! - −15 when the energy gap exceeds 0.3
//!
//! ### Made For You (unseeded)
//! - Cosine similarity to the taste vector × 0.5
//! - +0.3 followed artist
//! - Play count relative to the catalog maximum × 0.2
//! - +0.1 liked
//!
//! Both rank with a stable sort, so equal scores keep catalog order.
//!
//! ## Error Handling
//!
//! Scoring and queue generation are total. Storage, settings, session files and
//! the audio output return `anyhow::Result` with context.

pub mod algorithm;
pub mod cli;
pub mod commands;
pub mod completion;
pub mod config;
pub mod db;
pub mod enrich;
pub mod library;
pub mod playback;
pub mod profile;
pub mod queue;
pub mod session;
pub mod track;
