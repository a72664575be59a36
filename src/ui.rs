//! Terminal output for a batch run: progress bar and colored status lines.
//!
//! Uses `indicatif` for the bar and `console` for styling. Everything here
//! is presentation only; the ledger never depends on it.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::ledger::Ledger;

/// Visual progress for a batch in the terminal.
///
/// Green for successes, red for failures, yellow for retries and pauses.
pub struct BatchProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
}

impl BatchProgress {
    /// Starts a bar sized to the number of entries in the input.
    pub fn start(total: usize) -> Self {
        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{pos}/{len}] {wide_msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        Self::with_bar(pb)
    }

    /// A bar that draws nothing.
    #[cfg(test)]
    pub fn hidden() -> Self {
        Self::with_bar(ProgressBar::hidden())
    }

    fn with_bar(pb: ProgressBar) -> Self {
        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    pub fn job_started(&self, position: usize, total: usize, login: &str) {
        self.pb.set_position(position.saturating_sub(1) as u64);
        self.pb
            .set_message(format!("[{position}/{total}] changing password for {login}"));
    }

    pub fn attempt(&self, login: &str, attempt: u32, max: u32) {
        self.pb
            .set_message(format!("{login}: attempt {attempt}/{max}"));
    }

    pub fn retry(&self, attempt: u32, max: u32, reason: &str, delay_secs: u64) {
        self.pb.println(format!(
            "  {} Attempt {attempt}/{max} failed: {reason} (waiting {delay_secs}s)",
            self.yellow.apply_to("↻")
        ));
    }

    pub fn succeeded(&self, login: &str, attempts: u32) {
        self.pb.inc(1);
        self.pb.println(format!(
            "  {} {login} changed after {attempts} attempt(s)",
            self.green.apply_to("✓")
        ));
    }

    pub fn failed(&self, login: &str, reason: &str) {
        self.pb.inc(1);
        self.pb
            .println(format!("  {} {login}: {reason}", self.red.apply_to("✗")));
    }

    pub fn skipped(&self, position: usize, total: usize, content: &str) {
        self.pb.inc(1);
        self.pb.println(format!(
            "  {} [{position}/{total}] malformed entry skipped: {content}",
            self.yellow.apply_to("!")
        ));
    }

    pub fn pause(&self, delay_secs: u64) {
        self.pb
            .set_message(format!("pausing {delay_secs}s before the next account"));
    }

    /// Clears the bar and prints the final counts and output locations.
    pub fn finish(&self, ledger: &Ledger, success_file: &str, failed_file: &str) {
        self.pb.finish_and_clear();
        println!();
        println!(
            "Done. {} {}, {} {}",
            self.green.apply_to("Succeeded:"),
            ledger.succeeded().len(),
            self.red.apply_to("failed:"),
            ledger.failed().len()
        );
        println!("Results written to {success_file} and {failed_file}");
    }
}
