//! # Command-Line Interface Module
//!
//! Clap definitions for the `melody` binary. Every invocation loads the player
//! session from the data directory, applies one command and saves it again, so
//! a shell (or a key binding) can drive playback one command at a time.
//!
//! ## Commands
//!
//! - `import`: load a JSON catalog into the database
//! - `list`: show the catalog
//! - `play`, `next`, `skip`, `end`, `previous`, `pause`, `seek`: playback
//! - `enqueue`, `queue`: the live queue and smart-queue previews
//! - `mix`: the made-for-you mix
//! - `like`, `follow`, `profile`, `playlist`: the listener library
//!
//! ## Examples
//!
//! ```bash
//! melody import songs.json --enrich
//! melody play 42
//! melody end            # track finished, counts as a completed listen
//! melody queue --seed 7
//! melody mix
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

/// Main application arguments structure.
#[derive(Parser, Debug)]
#[command(name = "melody")]
#[command(about = "Melody: taste-vector recommendations and smart queues for a streaming catalog")]
#[command(version)]
pub struct Args {
    /// Directory holding melody.db, session.json and config.json
    #[arg(long, global = true, env = "MELODY_DATA_DIR", value_hint = clap::ValueHint::DirPath)]
    pub data_dir: Option<PathBuf>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Import a JSON array of tracks into the catalog
    ///
    /// Genres are reduced to their primary genre and languages normalized to
    /// short codes. Tracks already in the catalog are updated in place.
    Import {
        /// JSON file with an array of track records
        #[arg(value_hint = clap::ValueHint::FilePath)]
        file: PathBuf,

        /// Estimate features for tracks that have none
        #[arg(long)]
        enrich: bool,

        /// Seed for the estimation jitter, for reproducible imports
        #[arg(long, requires = "enrich")]
        seed: Option<u64>,
    },

    /// List the catalog
    List {
        /// Only tracks of this primary genre
        #[arg(long)]
        genre: Option<String>,
    },

    /// Play a track; playing the current track toggles pause
    Play {
        /// Track id
        id: String,
    },

    /// Advance to the next track
    Next,

    /// Skip the current track (not counted against it)
    Skip,

    /// The current track finished playing
    End,

    /// Go back to the previous track, or restart the current one
    Previous,

    /// Pause or resume
    Pause,

    /// Seek within the current track
    Seek {
        /// Position in seconds
        seconds: f64,
    },

    /// Append a track to the live queue
    Enqueue {
        /// Track id
        id: String,
    },

    /// Show the live queue, or preview the smart queue for a seed
    Queue {
        /// Track id to seed a preview from
        #[arg(long)]
        seed: Option<String>,
    },

    /// Show the made-for-you mix
    Mix,

    /// Toggle the like on a track (default: the current track)
    Like {
        /// Track id
        id: Option<String>,
    },

    /// Toggle following an artist (default: the current track's artist)
    Follow {
        /// Artist name, matched exactly
        artist: Option<String>,
    },

    /// Show the taste profile
    Profile,

    /// Manage playlists
    Playlist {
        #[command(subcommand)]
        action: PlaylistAction,
    },

    /// Generate shell completions
    ///
    /// Usage: melody completion bash > ~/.local/share/bash-completion/completions/melody
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },

    /// List track ids for completion (hidden command)
    #[command(hide = true)]
    CompleteTracks,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum PlaylistAction {
    /// Create an empty playlist
    Create { name: String },

    /// List playlists, newest first
    List,

    /// Append a track to a playlist
    Add {
        /// Playlist id
        playlist: i64,
        /// Track id
        id: String,
    },

    /// Show the tracks of a playlist
    Show {
        /// Playlist id
        playlist: i64,
    },

    /// Delete a playlist
    Delete {
        /// Playlist id
        playlist: i64,
    },
}
