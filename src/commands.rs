//! Command execution for the `melody` binary.
//!
//! [`run`] opens the store, applies one [`Command`] and writes human-readable
//! output. Player commands go through a [`PlayerSession`] restored from
//! `session.json`; the session is saved again even when the audio output
//! fails, because the session state was already updated.
//!
//! Likes and follows are written through to the database, and every track
//! that starts playing bumps its catalog play count.

use crate::algorithm::{self, DEFAULT_RECOMMENDATION_LIMIT};
use crate::cli::{Command, PlaylistAction};
use crate::completion;
use crate::config::RuntimeConfig;
use crate::db::SqliteLibrary;
use crate::enrich;
use crate::library::{Catalog, UserLibrary};
use crate::playback::{output_for, AudioOutput};
use crate::profile::TASTE_WINDOW;
use crate::queue::QueuedTrack;
use crate::session::{Outcome, PlayerEvent, PlayerSession, SessionState};
use crate::track::Track;
use anyhow::{bail, Context, Result};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::io::Write;
use std::path::Path;

/// Execute `command` against the data directory described by `config`.
///
/// # Errors
///
/// Returns an error for unknown ids, invalid input, storage failures and
/// audio output failures.
pub fn run(command: Command, config: &RuntimeConfig, out: &mut dyn Write) -> Result<()> {
    let mut library = SqliteLibrary::open(&config.db_path)?;

    match command {
        Command::Import { file, enrich, seed } => import(&mut library, &file, enrich, seed, out),
        Command::List { genre } => list(&library, genre.as_deref(), out),
        Command::Playlist { action } => playlist(&mut library, action, out),
        Command::Completion { shell } => {
            completion::write_completions(shell, out);
            Ok(())
        }
        Command::CompleteTracks => completion::write_track_completions(&library.tracks()?, out),
        player_command => {
            let mut session = restore_session(&library, config)?;
            let result = player(&mut library, &mut session, player_command, out);
            session
                .into_state()
                .save(&config.session_path)
                .context("Failed to save player session")?;
            result
        }
    }
}

type CliSession = PlayerSession<Box<dyn AudioOutput>, StdRng>;

fn restore_session(library: &SqliteLibrary, config: &RuntimeConfig) -> Result<CliSession> {
    let recommender = config.settings.recommender;
    let state = SessionState::load(&config.session_path)?
        .unwrap_or_else(|| SessionState::with_history_capacity(recommender.effective_history_capacity()));

    let mut session = PlayerSession::with_state(
        state,
        library.tracks()?,
        recommender,
        output_for(config.settings.audio_backend),
        StdRng::from_entropy(),
    );
    session.set_library(library.liked_ids()?, library.followed_artists()?);
    Ok(session)
}

/// Apply a player command to `session`, mirroring its outcome into `library`.
///
/// # Errors
///
/// Returns an error for unknown ids, a missing current track where one is
/// needed, and output failures.
pub fn player<O: AudioOutput, R: Rng>(
    library: &mut SqliteLibrary,
    session: &mut PlayerSession<O, R>,
    command: Command,
    out: &mut dyn Write,
) -> Result<()> {
    let event = match command {
        Command::Play { id } => PlayerEvent::Play(library.require_track(&id)?),
        Command::Next => PlayerEvent::Next,
        Command::Skip => PlayerEvent::Skip,
        Command::End => PlayerEvent::TrackEnded,
        Command::Previous => PlayerEvent::Previous,
        Command::Pause => PlayerEvent::TogglePlayback,
        Command::Seek { seconds } => PlayerEvent::Seek(seconds),
        Command::Enqueue { id } => PlayerEvent::Enqueue(library.require_track(&id)?),
        Command::Like { id } => {
            let id = match id {
                Some(id) => library.require_track(&id)?.id,
                None => current_track(session)?.id.clone(),
            };
            PlayerEvent::ToggleLike(id)
        }
        Command::Follow { artist } => {
            let artist = match artist {
                Some(artist) => artist,
                None => current_track(session)?.artist.clone(),
            };
            PlayerEvent::ToggleFollow(artist)
        }
        Command::Queue { seed } => return show_queue(library, session, seed.as_deref(), out),
        Command::Mix => return show_tracks(out, "Made for you", &session.made_for_you()),
        Command::Profile => return show_profile(session, out),
        other => bail!("`{other:?}' is not a player command"),
    };

    let outcome = session.dispatch(event)?;
    report(library, &outcome, out)
}

fn current_track<O: AudioOutput, R: Rng>(session: &PlayerSession<O, R>) -> Result<&Track> {
    session
        .current()
        .context("Nothing is playing; pass an explicit argument")
}

fn report(library: &mut SqliteLibrary, outcome: &Outcome, out: &mut dyn Write) -> Result<()> {
    match outcome {
        Outcome::Started(track) => {
            if let Err(err) = library.increment_play_count(&track.id) {
                warn!("Play of {track} not counted in the catalog: {err:#}");
            }
            writeln!(out, "Now playing: {track}")?;
        }
        Outcome::Paused => writeln!(out, "Paused")?,
        Outcome::Resumed => writeln!(out, "Resumed")?,
        Outcome::Seeked(seconds) => writeln!(out, "Seeked to {seconds:.0}s")?,
        Outcome::Queued(length) => writeln!(out, "Queued ({length} in queue)")?,
        Outcome::Liked { track_id, liked } => {
            library.set_liked(track_id, *liked)?;
            let verb = if *liked { "Liked" } else { "Unliked" };
            writeln!(out, "{verb} {track_id}")?;
        }
        Outcome::Following { artist, following } => {
            library.set_following(artist, *following)?;
            let verb = if *following { "Following" } else { "Unfollowed" };
            writeln!(out, "{verb} {artist}")?;
        }
        Outcome::Unchanged => writeln!(out, "Nothing else to play")?,
    }
    Ok(())
}

fn show_queue<O: AudioOutput, R: Rng>(
    library: &SqliteLibrary,
    session: &PlayerSession<O, R>,
    seed: Option<&str>,
    out: &mut dyn Write,
) -> Result<()> {
    if let Some(seed) = seed {
        let seed = library.require_track(seed)?;
        return show_tracks(out, &format!("Smart queue from {seed}"), &session.smart_queue(&seed));
    }

    let state = session.state();
    match &state.current {
        Some(track) => {
            let status = if state.is_playing { "Playing" } else { "Paused" };
            writeln!(out, "{status}: {track}")?;
        }
        None => writeln!(out, "Nothing is playing")?,
    }
    for (position, track) in state.queue.iter().enumerate() {
        writeln!(out, "{:>3}. {track}", position + 1)?;
    }
    Ok(())
}

fn show_tracks(out: &mut dyn Write, heading: &str, tracks: &[QueuedTrack]) -> Result<()> {
    if tracks.is_empty() {
        writeln!(out, "{heading}: nothing to suggest yet")?;
        return Ok(());
    }
    writeln!(out, "{heading}:")?;
    for (position, entry) in tracks.iter().enumerate() {
        writeln!(out, "{:>3}. {entry}", position + 1)?;
    }
    Ok(())
}

fn show_profile<O: AudioOutput, R: Rng>(session: &PlayerSession<O, R>, out: &mut dyn Write) -> Result<()> {
    let state = session.state();
    let taste = session.taste();
    writeln!(out, "Taste: {taste}")?;
    writeln!(
        out,
        "History: {} tracks (taste uses the last {TASTE_WINDOW})",
        state.history.len()
    )?;

    writeln!(out, "Top genres:")?;
    for (genre, affinity) in state.profile.top_genres(5) {
        writeln!(out, "  {genre:<20} {affinity:>6.1}")?;
    }

    writeln!(out, "Liked tracks: {}", state.liked.len())?;
    let followed: Vec<&str> = state.followed_artists.iter().map(String::as_str).collect();
    writeln!(out, "Following: {}", followed.join(", "))?;

    writeln!(out, "Closest to your taste:")?;
    for track in algorithm::recommend(&taste, session.catalog(), DEFAULT_RECOMMENDATION_LIMIT) {
        writeln!(out, "  {track}")?;
    }
    Ok(())
}

fn import(
    library: &mut SqliteLibrary,
    file: &Path,
    enrich: bool,
    seed: Option<u64>,
    out: &mut dyn Write,
) -> Result<()> {
    let records = enrich::read_records(file)?;
    let mut rng = enrich.then(|| seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64));
    let (tracks, enriched) =
        enrich::prepare_catalog(records, rng.as_mut().map(|rng| rng as &mut dyn RngCore));

    let imported = library.import_tracks(&tracks)?;
    info!("Import of {} finished", file.display());
    writeln!(out, "Imported {imported} tracks ({enriched} with estimated features)")?;
    Ok(())
}

fn list(library: &SqliteLibrary, genre: Option<&str>, out: &mut dyn Write) -> Result<()> {
    let genre = genre.map(str::to_lowercase);
    let tracks = library.tracks()?;
    let shown = tracks
        .iter()
        .filter(|track| genre.as_ref().map_or(true, |genre| &track.genre == genre));

    for track in shown {
        writeln!(
            out,
            "{}\t{} - {}\t{}/{}\t{:.2} {:.2} {:.2}\tplays {}",
            track.id,
            track.artist,
            track.title,
            track.genre,
            track.language,
            track.energy,
            track.valence,
            track.danceability,
            track.play_count
        )?;
    }
    Ok(())
}

fn playlist(library: &mut SqliteLibrary, action: PlaylistAction, out: &mut dyn Write) -> Result<()> {
    match action {
        PlaylistAction::Create { name } => {
            let playlist = library.create_playlist(&name)?;
            writeln!(out, "Created playlist {} ({})", playlist.id, playlist.name)?;
        }
        PlaylistAction::List => {
            for playlist in library.playlists()? {
                let size = library.playlist_track_ids(playlist.id)?.len();
                writeln!(out, "{}\t{}\t{size} tracks", playlist.id, playlist.name)?;
            }
        }
        PlaylistAction::Add { playlist, id } => {
            library.add_to_playlist(playlist, &id)?;
            writeln!(out, "Added {id} to playlist {playlist}")?;
        }
        PlaylistAction::Show { playlist } => {
            let ids = library.playlist_track_ids(playlist)?;
            for (position, track) in library.tracks_by_ids(&ids)?.iter().enumerate() {
                writeln!(out, "{:>3}. {track}", position + 1)?;
            }
        }
        PlaylistAction::Delete { playlist } => {
            if !library.delete_playlist(playlist)? {
                bail!("No playlist with id {playlist}");
            }
            writeln!(out, "Deleted playlist {playlist}")?;
        }
    }
    Ok(())
}
