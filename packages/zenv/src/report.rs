use std::fmt;

use colored::Colorize;
use itertools::Itertools;
use zenv_primitives::{GroupName, InstallId};

/// One failed attempt against one input: the first descriptor of the
/// group that did not resolve there.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailedAttempt {
    pub install_id: InstallId,
    pub input_url: String,
}

/// A group that no input could satisfy, with every input that was tried.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolutionFailure {
    pub group: GroupName,
    pub attempts: Vec<FailedAttempt>,
}

/// The aggregate of every failing group in a resolution run. Kept
/// structured so callers can inspect it; `Display` renders the
/// user-facing multi-line message.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolutionFailures(pub Vec<ResolutionFailure>);

impl ResolutionFailures {
    pub fn push(&mut self, failure: ResolutionFailure) {
        self.0.push(failure);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ResolutionFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to resolve some package(s):")?;

        for failure in &self.0 {
            write!(f, "\n  in '{}':", failure.group)?;

            let attempts = failure.attempts.iter()
                .map(|attempt| format!(
                    "\n    failed to resolve '{}' in input '{}'",
                    attempt.install_id, attempt.input_url,
                ))
                .join("");

            write!(f, "{}", attempts)?;
        }

        Ok(())
    }
}

pub fn info(message: &str) {
    println!("{} {}", "➤".blue(), message);
}

pub fn warn(message: &str) {
    eprintln!("{} {}", "➤".yellow(), message);
}

pub fn error(message: &str) {
    eprintln!("{} {}", "➤".red(), message);
}
