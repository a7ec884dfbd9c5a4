use anyhow::{Context, Result};
use std::io::{self, BufRead, Write};

/// Questions asked during interactive runs.
pub trait Prompt {
    /// Yes/no question defaulting to yes. Only an explicit "n"/"no" declines.
    fn confirm(&mut self, question: &str) -> Result<bool>;

    /// Free-text question. `None` when no answer can be given (end of input).
    fn ask(&mut self, question: &str) -> Result<Option<String>>;
}

impl<P: Prompt + ?Sized> Prompt for Box<P> {
    fn confirm(&mut self, question: &str) -> Result<bool> {
        (**self).confirm(question)
    }

    fn ask(&mut self, question: &str) -> Result<Option<String>> {
        (**self).ask(question)
    }
}

/// Answers every yes/no question with yes; cannot answer free-text questions.
#[derive(Debug, Default, Clone, Copy)]
pub struct AssumeYes;

impl Prompt for AssumeYes {
    fn confirm(&mut self, question: &str) -> Result<bool> {
        tracing::debug!("assuming yes: {question}");
        Ok(true)
    }

    fn ask(&mut self, _question: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Reads answers line by line, from stdin by default.
pub struct StdinPrompt {
    reader: Box<dyn BufRead>,
}

impl Default for StdinPrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl StdinPrompt {
    pub fn new() -> Self {
        Self::from_reader(io::BufReader::new(io::stdin()))
    }

    pub fn from_reader(reader: impl BufRead + 'static) -> Self {
        Self {
            reader: Box::new(reader),
        }
    }

    fn read_answer(&mut self, prompt: &str) -> Result<Option<String>> {
        let mut stdout = io::stdout().lock();
        write!(stdout, "{prompt}").context("Failed to write prompt")?;
        stdout.flush().context("Failed to flush prompt")?;
        drop(stdout);

        let mut line = String::new();
        let read = self
            .reader
            .read_line(&mut line)
            .context("Failed to read answer")?;
        if read == 0 {
            println!();
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}

impl Prompt for StdinPrompt {
    fn confirm(&mut self, question: &str) -> Result<bool> {
        // End of input counts as "no" so piped runs never act unasked.
        Ok(self
            .read_answer(&format!("{question} (Y/n) "))?
            .map(|answer| is_yes(&answer))
            .unwrap_or(false))
    }

    fn ask(&mut self, question: &str) -> Result<Option<String>> {
        self.read_answer(&format!("{question} "))
    }
}

fn is_yes(answer: &str) -> bool {
    !matches!(answer.trim().to_ascii_lowercase().as_str(), "n" | "no")
}
