use std::io::{self, BufRead};

use console::{style, Term};

use super::{Console, Tone};

/// Console backed by the process terminal
#[derive(Debug, Clone)]
pub struct Terminal {
    term: Term,
}

impl Terminal {
    pub fn new() -> Self {
        Self {
            term: Term::stdout(),
        }
    }
}

impl Default for Terminal {
    fn default() -> Self {
        Self::new()
    }
}

impl Console for Terminal {
    fn line(&mut self, text: &str) {
        // A closed stdout leaves nothing to report to
        let _ = self.term.write_line(text);
    }

    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        self.term.write_str(&format!("{} ", style(prompt).bold()))?;
        self.term.flush()?;
        if self.term.is_term() {
            return self.term.read_line().map(Some);
        }
        // Piped input: a zero-byte read is end of input
        let mut buf = String::new();
        if io::stdin().lock().read_line(&mut buf)? == 0 {
            return Ok(None);
        }
        Ok(Some(buf.trim_end_matches(['\r', '\n']).to_string()))
    }

    fn note(&mut self, tone: Tone, text: &str) {
        let marker = match tone {
            Tone::Info => style(tone.marker()).cyan(),
            Tone::Success => style(tone.marker()).green(),
            Tone::Warning => style(tone.marker()).yellow(),
            Tone::Error => style(tone.marker()).red(),
        };
        let _ = self.term.write_line(&format!("  {} {}", marker, text));
    }

    fn heading(&mut self, title: &str) {
        let _ = self.term.write_line("");
        let _ = self
            .term
            .write_line(&format!("{}", style(format!("--- {} ---", title)).bold().cyan()));
    }

    fn clear(&mut self) {
        if self.term.is_term() {
            let _ = self.term.clear_screen();
        }
    }
}
