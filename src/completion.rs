//! # Shell Completion Module
//!
//! Static completion scripts come from clap; track ids are completed
//! dynamically through the hidden `complete-tracks` command.
//!
//! ```bash
//! melody completion bash > ~/.local/share/bash-completion/completions/melody
//! melody completion zsh > ~/.config/zsh/completions/_melody
//! ```

use crate::cli::{Args, Shell};
use crate::track::Track;
use anyhow::Result;
use clap::CommandFactory;
use clap_complete::{generate, Shell as CompletionShell};
use std::io::Write;

/// Write the completion script for `shell` to `out`.
pub fn write_completions(shell: Shell, out: &mut dyn Write) {
    let mut cmd = Args::command();
    let name = cmd.get_name().to_string();
    generate(shell_to_completion_shell(shell), &mut cmd, name, out);
}

/// Convert our Shell enum to clap_complete's Shell enum
#[must_use]
pub fn shell_to_completion_shell(shell: Shell) -> CompletionShell {
    match shell {
        Shell::Bash => CompletionShell::Bash,
        Shell::Zsh => CompletionShell::Zsh,
        Shell::Fish => CompletionShell::Fish,
        Shell::PowerShell => CompletionShell::PowerShell,
        Shell::Elvish => CompletionShell::Elvish,
    }
}

/// One `id<TAB>artist - title` line per track, in catalog order.
#[must_use]
pub fn track_completions(catalog: &[Track]) -> Vec<String> {
    catalog
        .iter()
        .map(|track| format!("{}\t{} - {}", track.id, track.artist, track.title))
        .collect()
}

/// Print [`track_completions`] to `out`.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_track_completions(catalog: &[Track], out: &mut dyn Write) -> Result<()> {
    for line in track_completions(catalog) {
        writeln!(out, "{line}")?;
    }
    Ok(())
}
