//! Progress bar helpers for multi-file ingests.
//!
//! In log-only mode bars are hidden and progress goes to the log instead,
//! which keeps output tail-friendly when running from cron or a service.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Copy, Default)]
pub struct Progress {
    log_only: bool,
}

impl Progress {
    pub fn new(log_only: bool) -> Self {
        Self { log_only }
    }

    pub fn is_log_only(&self) -> bool {
        self.log_only
    }

    /// Create a progress bar with consistent styling; hidden in log-only mode.
    pub fn bar(&self, len: u64, msg: &str) -> ProgressBar {
        let pb = ProgressBar::new(len);
        if self.log_only {
            pb.set_draw_target(ProgressDrawTarget::hidden());
        } else {
            let style = ProgressStyle::default_bar()
                .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> ");
            pb.set_style(style);
        }
        pb.set_message(msg.to_string());
        pb
    }

    /// Log progress for tail-friendly output; only in log-only mode.
    pub fn log(&self, phase: &str, current: u64, total: u64) {
        if self.log_only && total > 0 {
            let pct = 100.0 * current as f64 / total as f64;
            info!("[{}] {}/{} ({:.1}%)", phase, current, total, pct);
        }
    }
}

/// Format duration in human-readable format
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}
