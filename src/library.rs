//! Collaborator interfaces for catalog and listener data.
//!
//! The recommenders only consume in-memory snapshots; these traits are where
//! the snapshots come from. [`InMemoryLibrary`] backs tests and embedding,
//! [`crate::db::SqliteLibrary`] backs the command-line player.

use crate::track::Track;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Read-only access to the catalog.
pub trait Catalog {
    /// All tracks in catalog order.
    fn tracks(&self) -> Result<Vec<Track>>;

    fn track(&self, id: &str) -> Result<Option<Track>>;

    /// Like [`Catalog::track`], but a missing id is an error.
    fn require_track(&self, id: &str) -> Result<Track> {
        match self.track(id)? {
            Some(track) => Ok(track),
            None => bail!("No track with id `{id}' in the catalog"),
        }
    }
}

/// A named, ordered list of track ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: i64,
    pub name: String,
    pub cover: Option<String>,
}

/// Listener-owned records: likes, follows and playlists.
pub trait UserLibrary {
    fn liked_ids(&self) -> Result<BTreeSet<String>>;

    fn set_liked(&mut self, track_id: &str, liked: bool) -> Result<()>;

    /// Flip the like on a track; returns the new state.
    fn toggle_like(&mut self, track_id: &str) -> Result<bool> {
        let liked = !self.liked_ids()?.contains(track_id);
        self.set_liked(track_id, liked)?;
        Ok(liked)
    }

    fn followed_artists(&self) -> Result<BTreeSet<String>>;

    fn set_following(&mut self, artist: &str, following: bool) -> Result<()>;

    /// Flip the follow on an artist; returns the new state.
    fn toggle_follow(&mut self, artist: &str) -> Result<bool> {
        let following = !self.followed_artists()?.contains(artist);
        self.set_following(artist, following)?;
        Ok(following)
    }

    fn create_playlist(&mut self, name: &str) -> Result<Playlist>;

    /// Newest first.
    fn playlists(&self) -> Result<Vec<Playlist>>;

    fn add_to_playlist(&mut self, playlist_id: i64, track_id: &str) -> Result<()>;

    /// Track ids in insertion order.
    fn playlist_track_ids(&self, playlist_id: i64) -> Result<Vec<String>>;

    /// Returns whether a playlist was removed.
    fn delete_playlist(&mut self, playlist_id: i64) -> Result<bool>;
}

/// Reject names that are blank after trimming.
pub fn validate_playlist_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        bail!("Playlist name cannot be empty");
    }
    Ok(name)
}

/// Catalog and listener library held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLibrary {
    catalog: Vec<Track>,
    liked: BTreeSet<String>,
    followed: BTreeSet<String>,
    playlists: BTreeMap<i64, (Playlist, Vec<String>)>,
    next_playlist_id: i64,
}

impl InMemoryLibrary {
    #[must_use]
    pub fn new(catalog: Vec<Track>) -> Self {
        Self {
            catalog,
            next_playlist_id: 1,
            ..Self::default()
        }
    }
}

impl Catalog for InMemoryLibrary {
    fn tracks(&self) -> Result<Vec<Track>> {
        Ok(self.catalog.clone())
    }

    fn track(&self, id: &str) -> Result<Option<Track>> {
        Ok(self.catalog.iter().find(|track| track.id == id).cloned())
    }
}

impl UserLibrary for InMemoryLibrary {
    fn liked_ids(&self) -> Result<BTreeSet<String>> {
        Ok(self.liked.clone())
    }

    fn set_liked(&mut self, track_id: &str, liked: bool) -> Result<()> {
        match liked {
            true => self.liked.insert(track_id.to_string()),
            false => self.liked.remove(track_id),
        };
        Ok(())
    }

    fn followed_artists(&self) -> Result<BTreeSet<String>> {
        Ok(self.followed.clone())
    }

    fn set_following(&mut self, artist: &str, following: bool) -> Result<()> {
        match following {
            true => self.followed.insert(artist.to_string()),
            false => self.followed.remove(artist),
        };
        Ok(())
    }

    fn create_playlist(&mut self, name: &str) -> Result<Playlist> {
        let name = validate_playlist_name(name)?;
        let id = self.next_playlist_id.max(1);
        self.next_playlist_id = id + 1;

        let playlist = Playlist {
            id,
            name: name.to_string(),
            cover: None,
        };
        self.playlists.insert(id, (playlist.clone(), Vec::new()));
        Ok(playlist)
    }

    fn playlists(&self) -> Result<Vec<Playlist>> {
        Ok(self.playlists.values().rev().map(|(playlist, _)| playlist.clone()).collect())
    }

    fn add_to_playlist(&mut self, playlist_id: i64, track_id: &str) -> Result<()> {
        if self.track(track_id)?.is_none() {
            bail!("No track with id `{track_id}' in the catalog");
        }
        match self.playlists.get_mut(&playlist_id) {
            Some((_, tracks)) => {
                tracks.push(track_id.to_string());
                Ok(())
            }
            None => bail!("No playlist with id {playlist_id}"),
        }
    }

    fn playlist_track_ids(&self, playlist_id: i64) -> Result<Vec<String>> {
        match self.playlists.get(&playlist_id) {
            Some((_, tracks)) => Ok(tracks.clone()),
            None => bail!("No playlist with id {playlist_id}"),
        }
    }

    fn delete_playlist(&mut self, playlist_id: i64) -> Result<bool> {
        Ok(self.playlists.remove(&playlist_id).is_some())
    }
}
