use console::Term;
use dialoguer::{theme::ColorfulTheme, FuzzySelect, Input};

use crate::Result;

/// Interactive prompts used by a run.
///
/// Every method blocks until the user answers; nothing else in the run progresses meanwhile.
pub trait Session {
    /// Ask for the free-text search term
    fn read_query(&mut self) -> Result<String>;

    /// Let the user pick one entry. `None` means nothing was picked.
    fn select(&mut self, items: &[String]) -> Result<Option<usize>>;

    /// Ask for a single line of text
    fn read_line(&mut self, prompt: &str) -> Result<String>;

    /// Show a message to the user
    fn notify(&mut self, message: &str);
}

/// Terminal-backed session built on dialoguer
pub struct TerminalSession {
    term: Term,
    theme: ColorfulTheme,
}

impl TerminalSession {
    pub fn new() -> Self {
        Self {
            term: Term::stdout(),
            theme: ColorfulTheme::default(),
        }
    }
}

impl Default for TerminalSession {
    fn default() -> Self {
        Self::new()
    }
}

impl Session for TerminalSession {
    fn read_query(&mut self) -> Result<String> {
        let query = Input::<String>::with_theme(&self.theme)
            .with_prompt("What are you looking for?")
            .validate_with(|input: &String| -> std::result::Result<(), &str> {
                if input.trim().is_empty() {
                    Err("Please enter a search term")
                } else {
                    Ok(())
                }
            })
            .interact_text_on(&self.term)?;
        Ok(query)
    }

    fn select(&mut self, items: &[String]) -> Result<Option<usize>> {
        if items.is_empty() {
            return Ok(None);
        }

        let choice = FuzzySelect::with_theme(&self.theme)
            .with_prompt("Pick a song (Esc to cancel)")
            .items(items)
            .default(0)
            .interact_on_opt(&self.term)?;
        Ok(choice)
    }

    fn read_line(&mut self, prompt: &str) -> Result<String> {
        let line = Input::<String>::with_theme(&self.theme)
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text_on(&self.term)?;
        Ok(line)
    }

    fn notify(&mut self, message: &str) {
        if let Err(e) = self.term.write_line(message) {
            tracing::warn!("Could not write to terminal: {}", e);
        }
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        // Selection prompts hide the cursor; give it back however the run ended.
        let _ = self.term.show_cursor();
    }
}

#[cfg(test)]
pub(crate) use scripted::ScriptedSession;
