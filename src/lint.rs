use std::io::Write;
use std::time;
use tempfile::NamedTempFile;
use unicode_segmentation::UnicodeSegmentation;

use crate::utils::error_chain_fmt;

/// Longest report sent back to the chat, Telegram caps messages at 4096 characters.
pub const MAX_REPORT_LENGTH: usize = 1500;

#[derive(thiserror::Error)]
pub enum LintError {
    #[error("Failed to run the linter.")]
    Io(#[from] std::io::Error),
    #[error("The linter did not finish in time.")]
    TimedOut,
}

impl std::fmt::Debug for LintError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

/// Runs pylint (or a compatible program) on a snippet written to a temporary `.py` file.
pub struct LintRunner {
    program: String,
    timeout: time::Duration,
}

impl LintRunner {
    pub fn new(program: String, timeout: time::Duration) -> LintRunner {
        LintRunner { program, timeout }
    }

    /// Returns the trimmed standard output of the linter; empty means no findings.
    #[tracing::instrument(name = "Linting a code snippet", skip(self, code))]
    pub async fn run(&self, code: &str) -> Result<String, LintError> {
        let code = code.to_string();
        let file = tokio::task::spawn_blocking(move || -> Result<NamedTempFile, std::io::Error> {
            let mut file = tempfile::Builder::new().suffix(".py").tempfile()?;
            file.write_all(code.as_bytes())?;
            file.flush()?;
            Ok(file)
        })
        .await
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err))??;

        let output = tokio::process::Command::new(&self.program)
            .arg(file.path())
            .args(["--disable=all", "--enable=E,F,W,C,R"])
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, output)
            .await
            .map_err(|_| LintError::TimedOut)??;

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Removes a surrounding Markdown code fence (```), language tag line included.
pub fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();

    if trimmed.len() >= 6 && trimmed.starts_with("```") && trimmed.ends_with("```") {
        let lines: Vec<&str> = trimmed.lines().collect();
        if lines.len() >= 2 {
            return lines[1..lines.len() - 1].join("\n");
        }
    }

    trimmed.to_string()
}

/// Cuts a report to [`MAX_REPORT_LENGTH`] graphemes, marking the cut.
pub fn truncate_report(report: &str) -> String {
    if report.graphemes(true).count() <= MAX_REPORT_LENGTH {
        return report.to_string();
    }

    let head: String = report.graphemes(true).take(MAX_REPORT_LENGTH).collect();
    format!("{}\n\n[output truncated...]", head)
}
