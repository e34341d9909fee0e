//! # Audio Output
//!
//! The player session never decodes audio itself. It drives an [`AudioOutput`]
//! that can load, play, pause and seek a single stream.
//!
//! - [`MpcOutput`]: forwards to MPD through the `mpc` command-line client
//! - [`NullOutput`]: records the calls it receives, for tests and `--audio none`

use crate::track::Track;
use anyhow::{bail, Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::process::Command;

/// One stream at a time.
pub trait AudioOutput {
    /// Replace the current stream with `track`. Does not start playback.
    fn load(&mut self, track: &Track) -> Result<()>;

    fn play(&mut self) -> Result<()>;

    fn pause(&mut self) -> Result<()>;

    fn seek(&mut self, seconds: f64) -> Result<()>;
}

/// Which output the command-line player drives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioBackend {
    #[default]
    None,
    Mpc,
}

/// Build the output for `backend`.
#[must_use]
pub fn output_for(backend: AudioBackend) -> Box<dyn AudioOutput> {
    match backend {
        AudioBackend::None => Box::new(NullOutput::default()),
        AudioBackend::Mpc => Box::new(MpcOutput::new()),
    }
}

impl<O: AudioOutput + ?Sized> AudioOutput for Box<O> {
    fn load(&mut self, track: &Track) -> Result<()> {
        (**self).load(track)
    }

    fn play(&mut self) -> Result<()> {
        (**self).play()
    }

    fn pause(&mut self) -> Result<()> {
        (**self).pause()
    }

    fn seek(&mut self, seconds: f64) -> Result<()> {
        (**self).seek(seconds)
    }
}

/// A call received by [`NullOutput`].
#[derive(Debug, Clone, PartialEq)]
pub enum OutputCall {
    Load(String),
    Play,
    Pause,
    Seek(f64),
}

/// Output that plays nothing and remembers what it was asked to do.
#[derive(Debug, Clone, Default)]
pub struct NullOutput {
    pub calls: Vec<OutputCall>,
}

impl AudioOutput for NullOutput {
    fn load(&mut self, track: &Track) -> Result<()> {
        info!("Now playing: {track}");
        self.calls.push(OutputCall::Load(track.id.clone()));
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        self.calls.push(OutputCall::Play);
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.calls.push(OutputCall::Pause);
        Ok(())
    }

    fn seek(&mut self, seconds: f64) -> Result<()> {
        self.calls.push(OutputCall::Seek(seconds));
        Ok(())
    }
}

/// Drives MPD with `mpc`. Tracks are loaded by their `url`.
#[derive(Debug, Clone)]
pub struct MpcOutput {
    program: String,
}

impl MpcOutput {
    #[must_use]
    pub fn new() -> Self {
        Self {
            program: "mpc".to_string(),
        }
    }

    /// Run `mpc` with `args`, failing on a non-zero exit status.
    fn run(&self, args: &[&str]) -> Result<()> {
        debug!("Running {} {}", self.program, args.join(" "));
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .with_context(|| format!("Failed to execute {}. Please install mpc (MPD client)", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("{} {} failed: {}", self.program, args.join(" "), stderr.trim());
        }
        Ok(())
    }
}

impl Default for MpcOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioOutput for MpcOutput {
    fn load(&mut self, track: &Track) -> Result<()> {
        let Some(url) = track.url.as_deref() else {
            bail!("Track `{}' has no stream url to load", track.id);
        };
        self.run(&["clear"]).context("Failed to clear MPD queue before loading a track")?;
        self.run(&["add", url])
            .with_context(|| format!("Failed to add `{url}' to MPD"))?;
        info!("Loaded {track}");
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        self.run(&["play"]).context("Failed to start playback")
    }

    fn pause(&mut self) -> Result<()> {
        self.run(&["pause"]).context("Failed to pause playback")
    }

    fn seek(&mut self, seconds: f64) -> Result<()> {
        let position = format_position(seconds);
        self.run(&["seek", &position]).context("Failed to seek")
    }
}

/// `mpc seek` accepts `[[hh:]mm:]ss`; whole seconds are enough here.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn format_position(seconds: f64) -> String {
    let total = seconds.max(0.0).floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}
