//! Terminal clipboard
//!
//! Copies text with the OSC 52 escape sequence, which most terminal
//! emulators (and tmux with `set-clipboard on`) forward to the system
//! clipboard, including over SSH.

use std::io::{self, IsTerminal, Write};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};

use snaplink_core::{Clipboard, ClipboardError};

/// Clipboard that writes OSC 52 sequences to the controlling terminal
pub struct TerminalClipboard;

/// Build the OSC 52 sequence that puts `text` on the clipboard
fn osc52(text: &str) -> String {
    format!("\x1b]52;c;{}\x07", STANDARD.encode(text))
}

#[async_trait]
impl Clipboard for TerminalClipboard {
    async fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        let mut stdout = io::stdout();
        if !stdout.is_terminal() {
            return Err(ClipboardError("stdout is not a terminal".to_string()));
        }

        stdout
            .write_all(osc52(text).as_bytes())
            .and_then(|_| stdout.flush())
            .map_err(|e| ClipboardError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_osc52_sequence() {
        assert_eq!(osc52("hi"), "\x1b]52;c;aGk=\x07");
        assert_eq!(osc52(""), "\x1b]52;c;\x07");
    }
}
