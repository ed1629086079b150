//! Operator decisions as a pluggable policy.
//!
//! The reconciler and the snapshot manager never read the terminal directly.
//! They ask a [`Prompt`], which is a terminal in attended runs and a fixed
//! answer in automation and tests.

use std::io::{self, BufRead, Write};

pub trait Prompt {
    /// Yes/no question.
    fn confirm(&self, question: &str) -> bool;

    /// Pick one of `options`; `None` means the operator backed out.
    fn choose(&self, question: &str, options: &[String]) -> Option<usize>;

    /// Whether a human is there to answer `choose`.
    fn is_attended(&self) -> bool;
}

/// Fixed answers for unattended runs.
#[derive(Debug, Clone, Copy)]
pub struct NonInteractive {
    pub default: bool,
}

impl Prompt for NonInteractive {
    fn confirm(&self, _question: &str) -> bool {
        self.default
    }

    fn choose(&self, _question: &str, _options: &[String]) -> Option<usize> {
        None
    }

    fn is_attended(&self) -> bool {
        false
    }
}

/// Reads answers from stdin.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

fn read_answer() -> Option<String> {
    io::stdout().flush().ok()?;
    let mut line = String::new();
    let read = io::stdin().lock().read_line(&mut line).ok()?;
    (read > 0).then(|| line.trim().to_string())
}

impl Prompt for TerminalPrompt {
    fn confirm(&self, question: &str) -> bool {
        print!("{} [y/N]: ", question);
        read_answer()
            .map(|a| matches!(a.to_lowercase().as_str(), "y" | "yes"))
            .unwrap_or(false)
    }

    fn choose(&self, question: &str, options: &[String]) -> Option<usize> {
        if options.is_empty() {
            return None;
        }
        println!("{}", question);
        for (idx, option) in options.iter().enumerate() {
            println!("  {:>2}) {}", idx + 1, option);
        }
        print!("Select [1-{}], empty to abort: ", options.len());
        parse_choice(&read_answer()?, options.len())
    }

    fn is_attended(&self) -> bool {
        true
    }
}

/// 1-based menu answer to a 0-based index.
fn parse_choice(answer: &str, count: usize) -> Option<usize> {
    let n: usize = answer.trim().parse().ok()?;
    (1..=count).contains(&n).then(|| n - 1)
}
