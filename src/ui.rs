//! Terminal output for people: right-aligned coloured labels followed by a
//! message. Warnings and errors go to stderr, everything else to stdout.

use anstyle::{AnsiColor, Style};
use is_terminal::IsTerminal;
use std::fmt::Display;
use std::io::{self, Write};
use std::time::{Duration, Instant};

const LABEL_WIDTH: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tone {
    Pending,
    Success,
    Info,
    Warn,
    Error,
}

impl Tone {
    fn to_stderr(self) -> bool {
        matches!(self, Tone::Warn | Tone::Error)
    }

    fn style(self) -> Style {
        let color = match self {
            Tone::Pending => AnsiColor::Cyan,
            Tone::Success => AnsiColor::Green,
            Tone::Info => AnsiColor::Blue,
            Tone::Warn => AnsiColor::Yellow,
            Tone::Error => AnsiColor::Red,
        };
        Style::new().bold().fg_color(Some(color.into()))
    }
}

fn colored(to_stderr: bool) -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if to_stderr {
        io::stderr().is_terminal()
    } else {
        io::stdout().is_terminal()
    }
}

/// Label padded to the column width; continuation lines line up under the message.
fn render(tone: Tone, label: &str, message: &str, color: bool) -> String {
    let label = format!("{label:>LABEL_WIDTH$}");
    let label = if color {
        let style = tone.style();
        format!("{}{label}{}", style.render(), style.render_reset())
    } else {
        label
    };

    let mut out = String::new();
    for (index, line) in message.split('\n').enumerate() {
        if index == 0 {
            out.push_str(&format!("{label} {line}\n"));
        } else {
            out.push_str(&format!("{:LABEL_WIDTH$} {line}\n", ""));
        }
    }
    out
}

fn emit(tone: Tone, label: &str, message: &str) {
    let to_stderr = tone.to_stderr();
    let text = render(tone, label, message, colored(to_stderr));
    // Output is best effort; a closed pipe must not abort a run.
    if to_stderr {
        let mut handle = io::stderr().lock();
        let _ = handle.write_all(text.as_bytes());
        let _ = handle.flush();
    } else {
        let mut handle = io::stdout().lock();
        let _ = handle.write_all(text.as_bytes());
        let _ = handle.flush();
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    match secs {
        60.. => match (secs / 60, secs % 60) {
            (minutes, 0) => format!("{minutes}m"),
            (minutes, seconds) => format!("{minutes}m {seconds}s"),
        },
        1.. => format!("{:.2}s", duration.as_secs_f64()),
        0 if duration.as_millis() > 0 => format!("{}ms", duration.as_millis()),
        0 => format!("{}µs", duration.as_micros()),
    }
}

pub fn status(label: &str, message: impl Display) {
    emit(Tone::Pending, label, &message.to_string());
}

pub fn info(message: impl Display) {
    emit(Tone::Info, "Info", &message.to_string());
}

pub fn warn(message: impl Display) {
    emit(Tone::Warn, "Warning", &message.to_string());
}

pub fn error(message: impl Display) {
    emit(Tone::Error, "Error", &message.to_string());
}

pub fn success(label: &str, message: impl Display) {
    emit(Tone::Success, label, &message.to_string());
}

/// Indented list item under the previous status line.
pub fn item(message: impl Display) {
    emit(Tone::Info, "", &format!("- {message}"));
}

/// Unlabelled line on stdout (menus, listings meant for copy/paste).
pub fn line(message: impl Display) {
    let mut handle = io::stdout().lock();
    let _ = writeln!(handle, "{message}");
    let _ = handle.flush();
}

/// A step that is announced when it starts and reported once when it ends.
///
/// Dropping an unfinished step reports it as cancelled.
pub struct Progress {
    message: String,
    started: Instant,
    done: bool,
}

impl Progress {
    pub fn new(label: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        emit(Tone::Pending, &label.into(), &message);
        Self {
            message,
            started: Instant::now(),
            done: false,
        }
    }

    fn finish(&mut self, tone: Tone, label: &str, text: String) {
        if !self.done {
            self.done = true;
            emit(tone, label, &text);
        }
    }

    fn elapsed(&self) -> String {
        format_duration(self.started.elapsed())
    }

    pub fn success(mut self, label: &str, detail: Option<String>) {
        let text = match detail.filter(|detail| !detail.is_empty()) {
            Some(detail) => format!("{} {detail} in {}", self.message, self.elapsed()),
            None => format!("{} in {}", self.message, self.elapsed()),
        };
        self.finish(Tone::Success, label, text);
    }

    pub fn fail(mut self, label: &str, error: impl Display) {
        let text = format!("{} after {}: {error}", self.message, self.elapsed());
        self.finish(Tone::Error, label, text);
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        let text = format!("{} (aborted)", self.message);
        self.finish(Tone::Warn, "Cancelled", text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Duration::from_micros(250), "250µs")]
    #[case(Duration::from_millis(42), "42ms")]
    #[case(Duration::from_millis(1500), "1.50s")]
    #[case(Duration::from_secs(120), "2m")]
    #[case(Duration::from_secs(135), "2m 15s")]
    fn test_format_duration(#[case] duration: Duration, #[case] expected: &str) {
        assert_eq!(format_duration(duration), expected);
    }

    #[test]
    fn test_render_aligns_continuation_lines() {
        let text = render(Tone::Info, "Info", "first\nsecond", false);
        assert_eq!(text, "        Info first\n             second\n");
    }

    #[test]
    fn test_render_empty_label() {
        let text = render(Tone::Info, "", "- item", false);
        assert_eq!(text, format!("{} - item\n", " ".repeat(LABEL_WIDTH)));
    }
}
