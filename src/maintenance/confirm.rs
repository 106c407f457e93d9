use std::io::{self, BufRead, Write};

use tracing::info;

/// Gate between a printed plan and its application.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Asks on the terminal; anything but `y`/`yes` declines.
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        print!("{prompt} [y/N] ");
        if io::stdout().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => is_affirmative(&answer),
            Err(_) => false,
        }
    }
}

/// `--yes`
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&self, prompt: &str) -> bool {
        info!("{prompt} yes (--yes)");
        true
    }
}

/// `--dry-run`
pub struct DryRun;

impl Confirm for DryRun {
    fn confirm(&self, _prompt: &str) -> bool {
        info!("Dry run: plan not applied");
        false
    }
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
