//! Terminal rendering of the chat transcript.

use console::style;
use jobtrack_client::Transcript;
use jobtrack_protocol::{ChatMessage, Sender};

/// Prints transcript entries as they appear. Entries rewritten in place
/// (the reasoning placeholder) are printed again with their new text.
#[derive(Debug, Default)]
pub struct TranscriptPrinter {
    seen: Vec<(String, String)>,
}

impl TranscriptPrinter {
    /// Lines not yet shown for `transcript`, in order.
    pub fn render_new(&mut self, transcript: &Transcript) -> Vec<String> {
        // Transcript was reset (modal reopened).
        if transcript.len() < self.seen.len() {
            self.seen.clear();
        }

        let mut lines = Vec::new();
        for (index, message) in transcript.messages().iter().enumerate() {
            match self.seen.get_mut(index) {
                Some((id, text)) if *id == message.id => {
                    if *text != message.text {
                        *text = message.text.clone();
                        lines.push(format_message(message));
                    }
                }
                Some(entry) => {
                    *entry = (message.id.clone(), message.text.clone());
                    lines.push(format_message(message));
                }
                None => {
                    self.seen.push((message.id.clone(), message.text.clone()));
                    lines.push(format_message(message));
                }
            }
        }
        lines
    }

    pub fn print_new(&mut self, transcript: &Transcript) {
        for line in self.render_new(transcript) {
            println!("{line}");
        }
    }
}

pub fn format_message(message: &ChatMessage) -> String {
    match message.sender {
        Sender::Ai => format!("{} {}", style("ai  ").cyan().bold(), message.text),
        Sender::User => format!("{} {}", style("you ").green().bold(), message.text),
        Sender::System if message.text.starts_with("Error") => {
            format!("{} {}", style("!!  ").red().bold(), style(&message.text).red())
        }
        Sender::System => format!("{} {}", style("--  ").dim(), style(&message.text).dim()),
    }
}

pub fn prompt() {
    use std::io::Write;

    print!("{} ", style(">").bold());
    let _ = std::io::stdout().flush();
}
