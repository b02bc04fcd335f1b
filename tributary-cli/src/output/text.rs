//! Text output formatting with progress bars and colors.

use chrono::{DateTime, Duration, Local, Utc};
use tributary_core::{CredentialUsage, JobState, ProviderKind, RunStatus, SyncJob};
use tributary_fetch::CacheStats;
use tributary_providers::ProviderDescriptor;
use tributary_sync::{ProviderState, SchedulerReport, SyncOutcome, SyncStatus};

// ============================================================================
// ANSI Colors
// ============================================================================

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const BLUE: &str = "\x1b[34m";
const CYAN: &str = "\x1b[36m";

// Progress bar characters
const BAR_FULL: char = '█';
const BAR_EMPTY: char = '░';

/// Text formatter with optional colors.
pub struct TextFormatter {
    use_colors: bool,
    bar_width: usize,
}

impl TextFormatter {
    /// Creates a new text formatter.
    pub fn new(use_colors: bool) -> Self {
        Self {
            use_colors,
            bar_width: 10,
        }
    }

    /// Set the progress bar width.
    #[allow(dead_code)]
    pub fn with_bar_width(mut self, width: usize) -> Self {
        self.bar_width = width;
        self
    }

    // ========================================================================
    // Jobs
    // ========================================================================

    /// Formats the result of a sync request.
    pub fn format_outcome(&self, provider: ProviderKind, outcome: &SyncOutcome) -> String {
        match outcome {
            SyncOutcome::Completed(job) => self.format_job(job),
            SyncOutcome::AlreadyRunning(job) => format!(
                "{} {} (job {} started {})",
                self.bold(provider.display_name()),
                self.yellow("already running"),
                job.id,
                self.format_time(job.started_at)
            ),
            SyncOutcome::BackedOff {
                until,
                consecutive_failures,
            } => {
                let until = until.map_or_else(|| "later".to_string(), |t| self.format_time(t));
                format!(
                    "{} {} after {} failure{}; retry {} or use --mode forced",
                    self.bold(provider.display_name()),
                    self.yellow("backing off"),
                    consecutive_failures,
                    if *consecutive_failures == 1 { "" } else { "s" },
                    until
                )
            }
        }
    }

    /// Formats a finished (or running) job.
    pub fn format_job(&self, job: &SyncJob) -> String {
        let mut lines = Vec::new();

        let state = match job.state {
            JobState::Succeeded if job.counts.errored > 0 => self.yellow("✓ succeeded with errors"),
            JobState::Succeeded => self.green("✓ succeeded"),
            JobState::Failed => self.red("✗ failed"),
            JobState::Running => self.cyan("● running"),
            JobState::Pending => self.dim("○ pending"),
        };
        let mut header = format!(
            "{} {} ({}, {} page{}",
            self.bold(job.provider.display_name()),
            state,
            job.mode,
            job.pages,
            if job.pages == 1 { "" } else { "s" }
        );
        if let Some(duration) = job.duration() {
            header.push_str(&format!(", {}", format_duration(duration)));
        }
        header.push(')');
        lines.push(header);

        let c = &job.counts;
        lines.push(format!(
            "  fetched {} · upserted {} ({} new) · skipped {} · errored {}",
            c.fetched,
            c.upserted,
            c.inserted,
            c.skipped,
            if c.errored > 0 {
                self.red(&c.errored.to_string())
            } else {
                c.errored.to_string()
            }
        ));

        let mut usage = format!("  units {}", self.format_number(job.units_consumed));
        if job.cached_pages > 0 {
            usage.push_str(&format!(" · {} cached page(s)", job.cached_pages));
        }
        if !job.credentials_used.is_empty() {
            usage.push_str(&format!(" · credentials {}", job.credentials_used.join(", ")));
        }
        lines.push(self.dim(&usage));

        if job.checkpoint_before != job.checkpoint_after {
            lines.push(self.dim(&format!(
                "  cursor {} → {}",
                cursor_label(job.checkpoint_before.as_deref()),
                cursor_label(job.checkpoint_after.as_deref())
            )));
        }

        if let Some(reason) = &job.reason {
            lines.push(format!("  {} {}", self.red("reason:"), reason));
        }

        lines.join("\n")
    }

    // ========================================================================
    // Status
    // ========================================================================

    /// Formats a provider's sync status.
    pub fn format_status(&self, status: &SyncStatus) -> String {
        let mut lines = Vec::new();

        let state = match status.state {
            ProviderState::Idle => self.dim("idle"),
            ProviderState::Running => self.cyan("running"),
        };
        lines.push(format!("{} {}", self.bold(status.provider.display_name()), state));

        match &status.checkpoint {
            Some(cp) => {
                let last = cp
                    .last_synced_at
                    .map_or_else(|| "never".to_string(), |t| self.format_time(t));
                let run = match cp.last_run_status {
                    Some(RunStatus::Success) => self.green("success"),
                    Some(RunStatus::Partial) => self.yellow("partial"),
                    Some(RunStatus::Failure) => self.red("failure"),
                    None => self.dim("none"),
                };
                lines.push(format!("  Last sync:   {last} ({run})"));
                lines.push(format!("  Cursor:      {}", cursor_label(cp.cursor.as_deref())));
                if let Some(scan) = cp.full_scan_cursor.as_deref() {
                    lines.push(format!("  Full rescan: at {}", cursor_label(Some(scan))));
                }
            }
            None => lines.push(format!("  Last sync:   {}", self.dim("never"))),
        }

        if status.consecutive_failures > 0 {
            lines.push(format!(
                "  Failures:    {}",
                self.red(&status.consecutive_failures.to_string())
            ));
        }
        if let Some(until) = status.backoff_until {
            lines.push(format!(
                "  Backing off until {}",
                self.yellow(&self.format_time(until))
            ));
        }

        if let Some(job) = &status.active_job {
            lines.push(format!(
                "  Active job:  {} ({}, {} pages, {} upserted)",
                job.id, job.mode, job.pages, job.counts.upserted
            ));
        }
        if let Some(job) = &status.last_job {
            let outcome = match job.state {
                JobState::Succeeded => self.green(&job.state.to_string()),
                _ => self.red(&job.state.to_string()),
            };
            lines.push(format!(
                "  Last job:    {} {} · {} upserted",
                outcome,
                self.format_time(job.finished_at.unwrap_or(job.started_at)),
                job.counts.upserted
            ));
        }

        lines.join("\n")
    }

    // ========================================================================
    // Quota
    // ========================================================================

    /// Formats per-credential usage for a provider.
    pub fn format_quota(
        &self,
        provider: ProviderKind,
        usage: &[CredentialUsage],
        unit: &str,
    ) -> String {
        let mut lines = vec![self.bold(provider.display_name())];

        if usage.is_empty() {
            lines.push(self.dim("  No credentials configured"));
            return lines.join("\n");
        }

        for cred in usage {
            let remaining = 100.0 - cred.percent_used();
            let bar = self.progress_bar(remaining);
            let mut line = format!(
                "  {:<12} {} {}/{} {}",
                cred.id,
                bar,
                self.format_number(cred.used_today),
                self.format_number(cred.daily_limit),
                unit
            );
            if cred.blocked {
                line.push_str(&format!(" {}", self.red("blocked")));
            }
            lines.push(line);
        }

        let available = usage.iter().filter(|c| !c.blocked).count();
        lines.push(self.dim(&format!(
            "  {} of {} credential(s) available · resets {}",
            available,
            usage.len(),
            usage[0].reset_day.succ_opt().unwrap_or(usage[0].reset_day)
        )));

        lines.join("\n")
    }

    /// Formats a progress bar.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn progress_bar(&self, percent_remaining: f64) -> String {
        let clamped = percent_remaining.clamp(0.0, 100.0);
        let filled = ((clamped / 100.0) * self.bar_width as f64).round() as usize;
        let empty = self.bar_width.saturating_sub(filled);

        let bar = format!(
            "{}{}",
            BAR_FULL.to_string().repeat(filled),
            BAR_EMPTY.to_string().repeat(empty)
        );

        self.color_for_percent(clamped, &bar)
    }

    // ========================================================================
    // Cache & Providers
    // ========================================================================

    /// Formats cache counters.
    pub fn format_cache_stats(&self, stats: &CacheStats, backend: &str) -> String {
        let connection = if backend == "none" {
            self.dim("disabled")
        } else if stats.connected {
            self.green("connected")
        } else {
            self.red("unreachable")
        };

        let mut lines = vec![
            format!("{} {} ({})", self.bold("Page cache"), backend, connection),
            "─".repeat(40),
        ];
        lines.push(format!(
            "Hits:    {} ({:.0}% of reads)",
            stats.hits,
            stats.hit_rate() * 100.0
        ));
        lines.push(format!("Misses:  {}", stats.misses));
        lines.push(format!("Writes:  {}", stats.sets));
        lines.push(format!("Deletes: {}", stats.deletes));
        if stats.errors > 0 {
            lines.push(format!("Errors:  {}", self.red(&stats.errors.to_string())));
        }
        lines.join("\n")
    }

    /// Formats provider list header.
    pub fn format_providers_header(&self) -> String {
        format!(
            "{:<12} {:<10} {:<8} {:<12} {}",
            self.bold("Provider"),
            self.bold("CLI"),
            self.bold("Enabled"),
            self.bold("Daily limit"),
            self.bold("Docs")
        )
    }

    /// Formats a single provider line.
    pub fn format_provider_line(
        &self,
        desc: &ProviderDescriptor,
        enabled: bool,
        credentials: usize,
    ) -> String {
        let enabled_str = if enabled {
            self.green(&format!("✓ {credentials}"))
        } else {
            self.dim("−")
        };

        format!(
            "{:<12} {:<10} {:<8} {:<12} {}",
            desc.display_name(),
            desc.cli_name(),
            enabled_str,
            format!(
                "{} {}",
                self.format_number(desc.metadata.default_daily_limit),
                desc.metadata.quota_unit
            ),
            self.blue(desc.metadata.docs_url)
        )
    }

    // ========================================================================
    // Watch
    // ========================================================================

    /// Formats the totals of a scheduler run.
    pub fn format_scheduler_report(&self, report: &SchedulerReport) -> String {
        let errors = if report.errors > 0 {
            self.red(&report.errors.to_string())
        } else {
            report.errors.to_string()
        };
        format!(
            "{} {} rounds · {} jobs started · {} skipped · {} errors",
            self.bold("Watch stopped:"),
            report.ticks,
            report.started,
            report.skipped,
            errors
        )
    }

    /// Formats an error message.
    pub fn format_error(&self, provider: &str, error: &str) -> String {
        format!("{}: {} - {}", self.bold(provider), self.red("Error"), error)
    }

    // ========================================================================
    // Color/style helpers
    // ========================================================================

    fn format_time(&self, at: DateTime<Utc>) -> String {
        let now = Utc::now();
        let diff = now - at;

        if diff >= Duration::zero() && diff < Duration::hours(24) {
            if diff < Duration::minutes(1) {
                "just now".to_string()
            } else if diff < Duration::hours(1) {
                format!("{}m ago", diff.num_minutes())
            } else {
                format!("{}h {}m ago", diff.num_hours(), diff.num_minutes() % 60)
            }
        } else {
            at.with_timezone(&Local)
                .format("%Y-%m-%d %H:%M")
                .to_string()
        }
    }

    fn color_for_percent(&self, percent: f64, text: &str) -> String {
        if !self.use_colors {
            return text.to_string();
        }

        if percent < 20.0 {
            self.red(text)
        } else if percent < 50.0 {
            self.yellow(text)
        } else {
            self.green(text)
        }
    }

    #[allow(clippy::cast_precision_loss, clippy::unused_self)]
    fn format_number(&self, n: u64) -> String {
        let n = n as f64;
        if n >= 1_000_000.0 {
            format!("{:.1}M", n / 1_000_000.0)
        } else if n >= 1_000.0 {
            format!("{:.1}K", n / 1_000.0)
        } else {
            format!("{n:.0}")
        }
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.use_colors {
            format!("{color}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn bold(&self, text: &str) -> String {
        self.paint(BOLD, text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint(DIM, text)
    }

    fn green(&self, text: &str) -> String {
        self.paint(GREEN, text)
    }

    fn yellow(&self, text: &str) -> String {
        self.paint(YELLOW, text)
    }

    fn red(&self, text: &str) -> String {
        self.paint(RED, text)
    }

    fn blue(&self, text: &str) -> String {
        self.paint(BLUE, text)
    }

    fn cyan(&self, text: &str) -> String {
        self.paint(CYAN, text)
    }
}

fn cursor_label(cursor: Option<&str>) -> String {
    match cursor {
        Some(c) if c.chars().count() > 40 => format!("{}…", c.chars().take(40).collect::<String>()),
        Some(c) => c.to_string(),
        None => "(start)".to_string(),
    }
}

#[allow(clippy::cast_precision_loss)]
fn format_duration(d: Duration) -> String {
    let ms = d.num_milliseconds().max(0);
    if ms < 1_000 {
        format!("{ms}ms")
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1_000.0)
    } else {
        format!("{}m {}s", ms / 60_000, (ms % 60_000) / 1_000)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_bar_full() {
        let formatter = TextFormatter::new(false);
        assert_eq!(formatter.progress_bar(100.0), "██████████");
    }

    #[test]
    fn test_progress_bar_clamps_out_of_range() {
        let formatter = TextFormatter::new(false);
        assert_eq!(formatter.progress_bar(-20.0), "░░░░░░░░░░");
        assert_eq!(formatter.progress_bar(140.0), "██████████");
    }

    #[test]
    fn test_format_number() {
        let formatter = TextFormatter::new(false);
        assert_eq!(formatter.format_number(500), "500");
        assert_eq!(formatter.format_number(1500), "1.5K");
        assert_eq!(formatter.format_number(1_500_000), "1.5M");
    }

    #[test]
    fn test_color_for_percent() {
        let formatter = TextFormatter::new(true);
        assert!(formatter.color_for_percent(15.0, "test").contains(RED));
        assert!(formatter.color_for_percent(35.0, "test").contains(YELLOW));
        assert!(formatter.color_for_percent(75.0, "test").contains(GREEN));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::milliseconds(250)), "250ms");
        assert_eq!(format_duration(Duration::milliseconds(1_500)), "1.5s");
        assert_eq!(format_duration(Duration::seconds(125)), "2m 5s");
    }

    #[test]
    fn test_cursor_label_truncates() {
        assert_eq!(cursor_label(None), "(start)");
        assert_eq!(cursor_label(Some("abc")), "abc");
        let long = "x".repeat(80);
        assert_eq!(cursor_label(Some(&long)).chars().count(), 41);
    }
}
