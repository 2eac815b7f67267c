//! Clipboard storage backends.
//!
//! `MemoryBackend` keeps text in-process. `SystemBackend` shells out to the
//! platform clipboard tools (`pbcopy`/`pbpaste` on macOS, `xclip` elsewhere).

use std::fmt;
use std::io::Write;
use std::process::{Command, Stdio};
use std::str::FromStr;

use parking_lot::Mutex;

/// Where clipboard text is stored.
pub trait ClipboardBackend: Send + Sync + fmt::Debug {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Replaces the clipboard contents.
    fn copy(&self, text: &str) -> Result<(), String>;

    /// Reads the clipboard contents.
    fn paste(&self) -> Result<String, String>;
}

/// Backend selected by the `[clipboard] backend` setting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackendKind {
    /// In-process storage.
    #[default]
    Memory,
    /// Platform clipboard tools.
    System,
}

impl BackendKind {
    /// Instantiates the backend.
    pub fn build(self) -> Box<dyn ClipboardBackend> {
        match self {
            Self::Memory => Box::new(MemoryBackend::default()),
            Self::System => Box::new(SystemBackend::detect()),
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "system" => Ok(Self::System),
            other => Err(format!("Unknown clipboard backend: {other}")),
        }
    }
}

/// In-process clipboard.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    content: Mutex<Option<String>>,
}

impl ClipboardBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn copy(&self, text: &str) -> Result<(), String> {
        *self.content.lock() = Some(text.to_string());
        Ok(())
    }

    fn paste(&self) -> Result<String, String> {
        self.content
            .lock()
            .clone()
            .ok_or_else(|| "Clipboard is empty.".to_string())
    }
}

/// System clipboard through external tools.
#[derive(Debug, Clone)]
pub struct SystemBackend {
    copy_cmd: (&'static str, &'static [&'static str]),
    paste_cmd: (&'static str, &'static [&'static str]),
}

impl SystemBackend {
    /// Picks the tools for the current platform.
    pub fn detect() -> Self {
        if cfg!(target_os = "macos") {
            Self {
                copy_cmd: ("pbcopy", &[]),
                paste_cmd: ("pbpaste", &[]),
            }
        } else {
            Self {
                copy_cmd: ("xclip", &["-selection", "clipboard"]),
                paste_cmd: ("xclip", &["-selection", "clipboard", "-o"]),
            }
        }
    }
}

impl ClipboardBackend for SystemBackend {
    fn name(&self) -> &'static str {
        "system"
    }

    fn copy(&self, text: &str) -> Result<(), String> {
        let (program, args) = self.copy_cmd;
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| format!("Failed to run {program}: {e}"))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .map_err(|e| format!("Failed to write to {program}: {e}"))?;
        }

        let status = child
            .wait()
            .map_err(|e| format!("Failed to wait for {program}: {e}"))?;
        if !status.success() {
            return Err(format!("{program} exited with {status}"));
        }
        Ok(())
    }

    fn paste(&self) -> Result<String, String> {
        let (program, args) = self.paste_cmd;
        let output = Command::new(program)
            .args(args)
            .stderr(Stdio::null())
            .output()
            .map_err(|e| format!("Failed to run {program}: {e}"))?;

        // A failing tool with partial output still counts as a paste.
        if !output.status.success() && output.stdout.is_empty() {
            return Err(format!("{program} exited with {}", output.status));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
