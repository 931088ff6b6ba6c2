//! System clipboard writer with a command-line fallback
//!
//! `arboard` first; when it cannot reach a clipboard (headless session,
//! missing display handles) the platform copy utilities are tried before
//! giving up.

use std::io::Write;
use std::process::{Command, Stdio};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::errors::{Error, Result};

/// Seam for everything that writes the user's clipboard.
#[async_trait]
pub trait ClipboardSink: Send + Sync {
    async fn set_text(&self, text: &str) -> Result<()>;
}

/// The real clipboard. Writes block, so they run on the blocking pool.
#[derive(Debug, Default)]
pub struct SystemClipboard;

#[async_trait]
impl ClipboardSink for SystemClipboard {
    async fn set_text(&self, text: &str) -> Result<()> {
        let text = text.to_string();
        tokio::task::spawn_blocking(move || write_text(&text))
            .await
            .map_err(|e| Error::ClipboardError(format!("clipboard task failed: {e}")))?
    }
}

fn write_text(text: &str) -> Result<()> {
    match arboard::Clipboard::new().and_then(|mut c| c.set_text(text.to_string())) {
        Ok(()) => Ok(()),
        Err(e) => {
            warn!("clipboard write failed ({e}), trying platform fallback");
            fallback_copy(text)
        }
    }
}

#[cfg(target_os = "linux")]
fn fallback_copy(text: &str) -> Result<()> {
    for (cmd, args) in [
        ("wl-copy", &[][..]),
        ("xclip", &["-selection", "clipboard"][..]),
    ] {
        match pipe_through(cmd, args, text) {
            Ok(()) => {
                debug!("clipboard written via {cmd}");
                return Ok(());
            }
            Err(e) => debug!("{cmd} fallback failed: {e}"),
        }
    }
    Err(Error::ClipboardError(
        "no usable clipboard backend (tried arboard, wl-copy, xclip)".to_string(),
    ))
}

#[cfg(target_os = "macos")]
fn fallback_copy(text: &str) -> Result<()> {
    pipe_through("pbcopy", &[], text)
        .map_err(|e| Error::ClipboardError(format!("pbcopy fallback failed: {e}")))
}

#[cfg(target_os = "windows")]
fn fallback_copy(text: &str) -> Result<()> {
    pipe_through("clip", &[], text)
        .map_err(|e| Error::ClipboardError(format!("clip fallback failed: {e}")))
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn fallback_copy(_text: &str) -> Result<()> {
    Err(Error::ClipboardError(
        "no clipboard fallback for this platform".to_string(),
    ))
}

fn pipe_through(cmd: &str, args: &[&str], text: &str) -> std::io::Result<()> {
    let mut child = Command::new(cmd)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(text.as_bytes())?;
    }
    let status = child.wait()?;
    if status.success() {
        Ok(())
    } else {
        Err(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("{cmd} exited with {status}"),
        ))
    }
}
