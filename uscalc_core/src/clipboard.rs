//! Copy-results support.
//!
//! The results block is a fixed template filled with the raw inputs and the
//! exact strings of the current readout. Writing it never touches metrics.

use crate::format::Readout;
use crate::{Error, RawInputs, Result};
use std::io::Write;
use std::process::{Command, Stdio};

pub const COPIED_MESSAGE: &str = "Copied to clipboard.";
pub const BLOCKED_MESSAGE: &str = "Could not copy automatically. (Clipboard access blocked.)";

/// Programs tried, in order, when no clipboard command is configured
const CANDIDATES: &[&[&str]] = &[
    &["wl-copy"],
    &["xclip", "-selection", "clipboard"],
    &["xsel", "--clipboard", "--input"],
    &["pbcopy"],
];

/// Something that accepts a block of text for the system clipboard
pub trait Clipboard {
    fn write_text(&mut self, text: &str) -> Result<()>;
}

/// Result of a copy request, as reported to the user
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CopyOutcome {
    Copied,
    Blocked(String),
}

impl CopyOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            CopyOutcome::Copied => COPIED_MESSAGE,
            CopyOutcome::Blocked(_) => BLOCKED_MESSAGE,
        }
    }
}

/// Render the results block
pub fn results_text(raw: &RawInputs, readout: &Readout) -> String {
    let field = |v: &Option<String>| v.as_deref().map(str::trim).unwrap_or("").to_string();

    let mut lines = vec![
        "Ultrasound Output Calculator".to_string(),
        format!("fc: {} MHz", field(&raw.frequency_mhz)),
        format!("z: {} cm", field(&raw.depth_cm)),
        format!("PNP water: {} MPa", field(&raw.peak_negative_pressure_mpa)),
    ];
    lines.extend(
        readout
            .rows()
            .iter()
            .map(|(label, value)| format!("{}: {}", label, value)),
    );
    lines.join("\n")
}

/// Place the results block on the clipboard; no retry on failure
pub fn copy_results(
    clipboard: &mut dyn Clipboard,
    raw: &RawInputs,
    readout: &Readout,
) -> CopyOutcome {
    let text = results_text(raw, readout);
    match clipboard.write_text(&text) {
        Ok(()) => {
            tracing::debug!("Copied {} bytes to clipboard", text.len());
            CopyOutcome::Copied
        }
        Err(e) => {
            tracing::warn!("Clipboard write failed: {}", e);
            CopyOutcome::Blocked(e.to_string())
        }
    }
}

/// Clipboard backed by an external program reading stdin
pub struct CommandClipboard {
    command: Option<Vec<String>>,
}

impl CommandClipboard {
    /// Use `command` (program followed by arguments), or auto-detect when `None`
    pub fn new(command: Option<Vec<String>>) -> Self {
        Self { command }
    }

    fn pipe_into(argv: &[String], text: &str) -> Result<()> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| Error::Clipboard("empty clipboard command".into()))?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::Clipboard(format!("{}: {}", program, e)))?;

        // Closing stdin signals end of text; the child is always reaped.
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(text.as_bytes()),
            None => Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "stdin unavailable",
            )),
        };
        let status = child.wait()?;
        written.map_err(|e| Error::Clipboard(format!("{}: {}", program, e)))?;

        if status.success() {
            Ok(())
        } else {
            Err(Error::Clipboard(format!("{} exited with {}", program, status)))
        }
    }
}

impl Clipboard for CommandClipboard {
    fn write_text(&mut self, text: &str) -> Result<()> {
        if let Some(ref argv) = self.command {
            return Self::pipe_into(argv, text);
        }

        let mut last_error = Error::Clipboard("no clipboard program available".into());
        for candidate in CANDIDATES {
            let argv: Vec<String> = candidate.iter().map(|s| s.to_string()).collect();
            match Self::pipe_into(&argv, text) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::debug!("Clipboard candidate {:?} failed: {}", candidate, e);
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }
}
