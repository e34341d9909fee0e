//! # Database Module
//!
//! SQLite storage for the catalog and the listener library.
//!
//! ## Schema
//!
//! - `tracks`: catalog entries, kept in import order (rowid)
//! - `liked_tracks`: liked track ids
//! - `followed_artists`: followed artist names
//! - `playlists` and `playlist_tracks`: user playlists; entries are removed
//!   with their playlist
//!
//! Re-importing a track id updates the row in place, so catalog order and
//! library references survive a refresh of the catalog file.

use crate::library::{validate_playlist_name, Catalog, Playlist, UserLibrary};
use crate::track::Track;
use anyhow::{bail, Context, Result};
use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;
use std::path::Path;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS tracks (
        id           TEXT PRIMARY KEY NOT NULL,
        title        TEXT NOT NULL,
        artist       TEXT NOT NULL,
        album        TEXT NOT NULL DEFAULT '',
        genre        TEXT NOT NULL,
        language     TEXT NOT NULL,
        energy       REAL NOT NULL,
        valence      REAL NOT NULL,
        danceability REAL NOT NULL,
        play_count   INTEGER NOT NULL DEFAULT 0,
        duration     REAL,
        url          TEXT,
        cover        TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_tracks_artist ON tracks(artist)",
    "CREATE TABLE IF NOT EXISTS liked_tracks (
        track_id TEXT PRIMARY KEY NOT NULL,
        created  INTEGER DEFAULT (cast(strftime('%s','now') as int))
    )",
    "CREATE TABLE IF NOT EXISTS followed_artists (
        artist  TEXT PRIMARY KEY NOT NULL,
        created INTEGER DEFAULT (cast(strftime('%s','now') as int))
    )",
    "CREATE TABLE IF NOT EXISTS playlists (
        id      INTEGER PRIMARY KEY AUTOINCREMENT,
        name    TEXT NOT NULL,
        cover   TEXT,
        created INTEGER DEFAULT (cast(strftime('%s','now') as int))
    )",
    "CREATE TABLE IF NOT EXISTS playlist_tracks (
        playlist_id INTEGER NOT NULL REFERENCES playlists(id) ON DELETE CASCADE,
        track_id    TEXT NOT NULL REFERENCES tracks(id) ON DELETE CASCADE,
        position    INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_playlist_tracks ON playlist_tracks(playlist_id, position)",
];

const TRACK_COLUMNS: &str =
    "id, title, artist, album, genre, language, energy, valence, danceability, play_count, duration, url, cover";

/// Catalog and listener library stored in one SQLite file.
pub struct SqliteLibrary {
    conn: Connection,
}

impl std::fmt::Debug for SqliteLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteLibrary")
            .field("path", &self.conn.path())
            .finish()
    }
}

impl SqliteLibrary {
    /// Open (or create) the database at `db_path` and make sure the schema exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the schema cannot be created.
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
        Self::from_connection(conn)
    }

    /// Private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute("PRAGMA foreign_keys = ON", [])
            .context("Failed to enable foreign keys")?;
        for statement in SCHEMA {
            conn.execute(statement, [])
                .with_context(|| format!("Failed to create schema: {statement}"))?;
        }
        Ok(Self { conn })
    }

    /// Insert or update `tracks` in one transaction. Returns the number written.
    ///
    /// # Errors
    ///
    /// Returns an error if any row cannot be written; nothing is committed then.
    pub fn import_tracks(&mut self, tracks: &[Track]) -> Result<usize> {
        let tx = self.conn.transaction()?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO tracks (id, title, artist, album, genre, language, energy, valence, danceability, play_count, duration, url, cover)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                 ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    artist = excluded.artist,
                    album = excluded.album,
                    genre = excluded.genre,
                    language = excluded.language,
                    energy = excluded.energy,
                    valence = excluded.valence,
                    danceability = excluded.danceability,
                    play_count = MAX(tracks.play_count, excluded.play_count),
                    duration = excluded.duration,
                    url = excluded.url,
                    cover = excluded.cover",
            )?;

            for track in tracks {
                stmt.execute(params![
                    track.id,
                    track.title,
                    track.artist,
                    track.album,
                    track.genre,
                    track.language,
                    track.energy,
                    track.valence,
                    track.danceability,
                    i64::try_from(track.play_count).unwrap_or(i64::MAX),
                    track.duration,
                    track.url,
                    track.cover,
                ])
                .with_context(|| format!("Failed to import track {track}"))?;
            }
        }

        tx.commit().context("Committing track import failed")?;
        info!("Imported {} tracks", tracks.len());
        Ok(tracks.len())
    }

    /// Bump the catalog-wide play count of a track.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is unknown or the update fails.
    pub fn increment_play_count(&self, track_id: &str) -> Result<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE tracks SET play_count = play_count + 1 WHERE id = ?1",
                [track_id],
            )
            .with_context(|| format!("Failed to update play count of `{track_id}'"))?;
        if changed == 0 {
            bail!("No track with id `{track_id}' in the catalog");
        }
        debug!("Play count of `{track_id}' incremented");
        Ok(())
    }

    /// Number of tracks in the catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn track_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM tracks", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Tracks whose id is in `ids`, in the order of `ids`. Unknown ids are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if a lookup fails.
    pub fn tracks_by_ids(&self, ids: &[String]) -> Result<Vec<Track>> {
        let mut tracks = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(track) = self.track(id)? {
                tracks.push(track);
            }
        }
        Ok(tracks)
    }

    fn playlist_exists(&self, playlist_id: i64) -> Result<bool> {
        let found = self
            .conn
            .query_row("SELECT 1 FROM playlists WHERE id = ?1", [playlist_id], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }
}

fn track_from_row(row: &Row<'_>) -> rusqlite::Result<Track> {
    let play_count: i64 = row.get(9)?;
    Ok(Track {
        id: row.get(0)?,
        title: row.get(1)?,
        artist: row.get(2)?,
        album: row.get(3)?,
        genre: row.get(4)?,
        language: row.get(5)?,
        energy: row.get(6)?,
        valence: row.get(7)?,
        danceability: row.get(8)?,
        play_count: u64::try_from(play_count).unwrap_or(0),
        duration: row.get(10)?,
        url: row.get(11)?,
        cover: row.get(12)?,
    })
}

impl Catalog for SqliteLibrary {
    fn tracks(&self) -> Result<Vec<Track>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {TRACK_COLUMNS} FROM tracks ORDER BY rowid"))?;
        let tracks = stmt
            .query_map([], track_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to load catalog")?;
        Ok(tracks)
    }

    fn track(&self, id: &str) -> Result<Option<Track>> {
        self.conn
            .query_row(
                &format!("SELECT {TRACK_COLUMNS} FROM tracks WHERE id = ?1"),
                [id],
                track_from_row,
            )
            .optional()
            .with_context(|| format!("Failed to look up track `{id}'"))
    }
}

impl UserLibrary for SqliteLibrary {
    fn liked_ids(&self) -> Result<BTreeSet<String>> {
        let mut stmt = self.conn.prepare("SELECT track_id FROM liked_tracks")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<BTreeSet<String>>>()?;
        Ok(ids)
    }

    fn set_liked(&mut self, track_id: &str, liked: bool) -> Result<()> {
        let sql = if liked {
            "INSERT OR IGNORE INTO liked_tracks (track_id) VALUES (?1)"
        } else {
            "DELETE FROM liked_tracks WHERE track_id = ?1"
        };
        self.conn
            .execute(sql, [track_id])
            .with_context(|| format!("Failed to update like on `{track_id}'"))?;
        Ok(())
    }

    fn followed_artists(&self) -> Result<BTreeSet<String>> {
        let mut stmt = self.conn.prepare("SELECT artist FROM followed_artists")?;
        let artists = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<BTreeSet<String>>>()?;
        Ok(artists)
    }

    fn set_following(&mut self, artist: &str, following: bool) -> Result<()> {
        let sql = if following {
            "INSERT OR IGNORE INTO followed_artists (artist) VALUES (?1)"
        } else {
            "DELETE FROM followed_artists WHERE artist = ?1"
        };
        self.conn
            .execute(sql, [artist])
            .with_context(|| format!("Failed to update follow on `{artist}'"))?;
        Ok(())
    }

    fn create_playlist(&mut self, name: &str) -> Result<Playlist> {
        let name = validate_playlist_name(name)?;
        self.conn
            .execute("INSERT INTO playlists (name) VALUES (?1)", [name])
            .with_context(|| format!("Failed to create playlist `{name}'"))?;
        Ok(Playlist {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
            cover: None,
        })
    }

    fn playlists(&self) -> Result<Vec<Playlist>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, cover FROM playlists ORDER BY id DESC")?;
        let playlists = stmt
            .query_map([], |row| {
                Ok(Playlist {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    cover: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(playlists)
    }

    fn add_to_playlist(&mut self, playlist_id: i64, track_id: &str) -> Result<()> {
        if !self.playlist_exists(playlist_id)? {
            bail!("No playlist with id {playlist_id}");
        }
        self.require_track(track_id)?;

        self.conn
            .execute(
                "INSERT INTO playlist_tracks (playlist_id, track_id, position)
                 VALUES (?1, ?2, (SELECT COALESCE(MAX(position) + 1, 0) FROM playlist_tracks WHERE playlist_id = ?1))",
                params![playlist_id, track_id],
            )
            .with_context(|| format!("Failed to add `{track_id}' to playlist {playlist_id}"))?;
        Ok(())
    }

    fn playlist_track_ids(&self, playlist_id: i64) -> Result<Vec<String>> {
        if !self.playlist_exists(playlist_id)? {
            bail!("No playlist with id {playlist_id}");
        }
        let mut stmt = self.conn.prepare(
            "SELECT track_id FROM playlist_tracks WHERE playlist_id = ?1 ORDER BY position",
        )?;
        let ids = stmt
            .query_map([playlist_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    fn delete_playlist(&mut self, playlist_id: i64) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM playlists WHERE id = ?1", [playlist_id])
            .with_context(|| format!("Failed to delete playlist {playlist_id}"))?;
        Ok(removed > 0)
    }
}
