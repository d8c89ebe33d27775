use anstyle::{AnsiColor, Style};
use is_terminal::IsTerminal;
use std::fmt::Display;
use std::io::{self, Write};
use std::time::{Duration, Instant};

use crate::stage::{StageResult, StageStatus};

const STATUS_WIDTH: usize = 12;

#[derive(Debug, Clone, Copy)]
enum StatusKind {
    Pending,
    Success,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

fn supports_color(stream: Stream) -> bool {
    let terminal = match stream {
        Stream::Stdout => io::stdout().is_terminal(),
        Stream::Stderr => io::stderr().is_terminal(),
    };
    terminal && std::env::var_os("NO_COLOR").is_none()
}

fn style_for(kind: StatusKind) -> Style {
    let style = Style::new().bold();
    match kind {
        StatusKind::Pending => style.fg_color(Some(AnsiColor::Cyan.into())),
        StatusKind::Success => style.fg_color(Some(AnsiColor::Green.into())),
        StatusKind::Info => style.fg_color(Some(AnsiColor::Blue.into())),
        StatusKind::Warn => style.fg_color(Some(AnsiColor::Yellow.into())),
        StatusKind::Error => style.fg_color(Some(AnsiColor::Red.into())),
    }
}

fn write_status(kind: StatusKind, label: &str, message: &str) {
    let stream = match kind {
        StatusKind::Warn | StatusKind::Error => Stream::Stderr,
        _ => Stream::Stdout,
    };

    let use_color = supports_color(stream);
    let mut handle: Box<dyn Write> = match stream {
        Stream::Stdout => Box::new(io::stdout().lock()),
        Stream::Stderr => Box::new(io::stderr().lock()),
    };

    let (prefix, suffix) = if use_color {
        let style = style_for(kind);
        (style.render().to_string(), style.render_reset().to_string())
    } else {
        (String::new(), String::new())
    };

    for (idx, line) in message.split('\n').enumerate() {
        if idx == 0 {
            let _ = writeln!(
                handle,
                "{prefix}{:>width$}{suffix} {line}",
                label,
                width = STATUS_WIDTH
            );
        } else {
            let _ = writeln!(handle, "{:>width$} {line}", "", width = STATUS_WIDTH);
        }
    }
    let _ = handle.flush();
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 60 {
        let minutes = duration.as_secs() / 60;
        let seconds = duration.as_secs() % 60;
        if seconds == 0 {
            format!("{minutes}m")
        } else {
            format!("{minutes}m {seconds}s")
        }
    } else if duration.as_secs_f64() >= 1.0 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

pub fn status(label: &str, message: impl Display) {
    write_status(StatusKind::Pending, label, &message.to_string());
}

pub fn info(message: impl Display) {
    write_status(StatusKind::Info, "Info", &message.to_string());
}

pub fn warn(message: impl Display) {
    write_status(StatusKind::Warn, "Warning", &message.to_string());
}

pub fn error(message: impl Display) {
    write_status(StatusKind::Error, "Error", &message.to_string());
}

pub fn success(label: &str, message: impl Display) {
    write_status(StatusKind::Success, label, &message.to_string());
}

fn status_label(status: StageStatus) -> &'static str {
    match status {
        StageStatus::Skipped => "Skipped",
        StageStatus::Installed => "Installed",
        StageStatus::Updated => "Updated",
        StageStatus::Failed => "Failed",
    }
}

/// Print one line per result, then a tally.
pub fn report(results: &[StageResult]) {
    for result in results {
        let label = status_label(result.status);
        let message = format!("[{}] {}", result.stage, result.detail);
        match result.status {
            StageStatus::Failed => write_status(StatusKind::Error, label, &message),
            StageStatus::Skipped => write_status(StatusKind::Info, label, &message),
            StageStatus::Installed | StageStatus::Updated => {
                write_status(StatusKind::Success, label, &message)
            }
        }
    }
    let summary = tally(results);
    if crate::stage::any_failed(results) {
        write_status(StatusKind::Error, "Summary", &summary);
    } else {
        write_status(StatusKind::Success, "Summary", &summary);
    }
}

fn tally(results: &[StageResult]) -> String {
    let count = |status: StageStatus| results.iter().filter(|r| r.status == status).count();
    format!(
        "{} installed, {} updated, {} skipped, {} failed",
        count(StageStatus::Installed),
        count(StageStatus::Updated),
        count(StageStatus::Skipped),
        count(StageStatus::Failed),
    )
}

/// A pending status line that reports its elapsed time when it finishes.
pub struct Progress {
    message: String,
    started: Instant,
    complete: bool,
}

impl Progress {
    pub fn new(label: impl Into<String>, message: impl Into<String>) -> Self {
        let label = label.into();
        let message = message.into();
        write_status(StatusKind::Pending, &label, &message);

        Self {
            message,
            started: Instant::now(),
            complete: false,
        }
    }

    pub fn success(mut self, label: &str) {
        self.complete = true;
        let elapsed = format_duration(self.started.elapsed());
        write_status(
            StatusKind::Success,
            label,
            &format!("{} in {elapsed}", self.message),
        );
    }

    pub fn fail(mut self, label: &str) {
        self.complete = true;
        let elapsed = format_duration(self.started.elapsed());
        write_status(
            StatusKind::Error,
            label,
            &format!("{} after {elapsed}", self.message),
        );
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        if !self.complete {
            let combined = format!("{} (aborted)", self.message);
            write_status(StatusKind::Warn, "Cancelled", &combined);
            self.complete = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::Stage;

    #[test]
    fn tally_counts_each_status() {
        let results = vec![
            StageResult::installed(Stage::Bundle, "fd"),
            StageResult::installed(Stage::Bundle, "ripgrep"),
            StageResult::skipped(Stage::Bundle, "jq"),
            StageResult::failed(Stage::Env, "dev"),
        ];
        assert_eq!(
            tally(&results),
            "2 installed, 0 updated, 1 skipped, 1 failed"
        );
    }

    #[test]
    fn durations_are_human_readable() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
        assert_eq!(format_duration(Duration::from_secs(120)), "2m");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
    }
}
