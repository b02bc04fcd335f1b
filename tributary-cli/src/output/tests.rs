//! CLI output formatting tests.
//!
//! These tests verify that CLI output is correctly formatted for both
//! text and JSON output modes.

use chrono::{NaiveDate, TimeZone, Utc};
use tributary_core::{
    CredentialUsage, FailureReason, ProviderKind, RunStatus, SyncCheckpoint, SyncJob, SyncMode,
};

fn finished_job() -> SyncJob {
    let start = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
    let mut job = SyncJob::new(ProviderKind::YouTube, SyncMode::Incremental, start);
    job.pages = 3;
    job.counts.fetched = 150;
    job.counts.upserted = 148;
    job.counts.inserted = 40;
    job.counts.skipped = 2;
    job.units_consumed = 300;
    job.credentials_used = vec!["primary".into(), "backup".into()];
    job.checkpoint_before = Some("CAUQAA".into());
    job.checkpoint_after = Some("CDIQAA".into());
    job.succeed(start + chrono::Duration::milliseconds(2_500));
    job
}

fn usage(id: &str, used: u64, blocked: bool) -> CredentialUsage {
    CredentialUsage {
        id: id.into(),
        used_today: used,
        daily_limit: 10_000,
        soft_limit: 9_000,
        blocked,
        reset_day: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
    }
}

#[cfg(test)]
mod text_formatter_tests {
    use super::super::text::TextFormatter;
    use super::*;
    use tributary_sync::{ProviderState, SyncOutcome, SyncStatus};

    #[test]
    fn test_progress_bar_boundary_values() {
        let formatter = TextFormatter::new(false);

        let test_cases = vec![
            (0.0, "░░░░░░░░░░"),
            (10.0, "█░░░░░░░░░"),
            (25.0, "███░░░░░░░"), // 2.5 rounds to 3 blocks
            (50.0, "█████░░░░░"),
            (75.0, "████████░░"), // 7.5 rounds to 8 blocks
            (100.0, "██████████"),
        ];

        for (percent, expected) in test_cases {
            let bar = formatter.progress_bar(percent);
            assert_eq!(bar, expected, "Failed for {percent}%");
        }
    }

    #[test]
    fn test_progress_bar_with_colors() {
        let formatter = TextFormatter::new(true);
        assert!(formatter.progress_bar(10.0).contains("\x1b[31m"), "Should be red for <20%");
        assert!(formatter.progress_bar(40.0).contains("\x1b[33m"), "Should be yellow for <50%");
        assert!(formatter.progress_bar(80.0).contains("\x1b[32m"), "Should be green for >=50%");
    }

    #[test]
    fn test_format_job_summary() {
        let formatter = TextFormatter::new(false);
        let output = formatter.format_job(&finished_job());

        assert!(output.contains("YouTube"));
        assert!(output.contains("✓ succeeded"));
        assert!(output.contains("incremental, 3 pages, 2.5s"));
        assert!(output.contains("upserted 148 (40 new)"));
        assert!(output.contains("skipped 2"));
        assert!(output.contains("credentials primary, backup"));
        assert!(output.contains("cursor CAUQAA → CDIQAA"));
        assert!(!output.contains("reason"));
    }

    #[test]
    fn test_format_job_failure_shows_reason() {
        let formatter = TextFormatter::new(false);
        let mut job = finished_job();
        job.fail(FailureReason::QuotaExhausted, job.started_at);

        let output = formatter.format_job(&job);
        assert!(output.contains("✗ failed"));
        assert!(output.contains("reason: quota_exhausted"));
    }

    #[test]
    fn test_format_job_no_colors() {
        let formatter = TextFormatter::new(false);
        let output = formatter.format_job(&finished_job());
        assert!(!output.contains("\x1b["), "Should not contain ANSI codes");
    }

    #[test]
    fn test_format_backed_off_outcome() {
        let formatter = TextFormatter::new(false);
        let outcome = SyncOutcome::BackedOff {
            until: None,
            consecutive_failures: 4,
        };
        let output = formatter.format_outcome(ProviderKind::GitHub, &outcome);
        assert!(output.contains("GitHub backing off after 4 failures"));
        assert!(output.contains("--mode forced"));
    }

    #[test]
    fn test_format_quota_marks_blocked() {
        let formatter = TextFormatter::new(false);
        let rows = vec![usage("primary", 9_500, true), usage("backup", 2_500, false)];
        let output = formatter.format_quota(ProviderKind::YouTube, &rows, "units");

        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "YouTube");
        assert!(lines[1].contains("primary"));
        assert!(lines[1].contains("9.5K/10.0K units blocked"));
        assert!(lines[2].contains("████████░░"));
        assert!(!lines[2].contains("blocked"));
        assert!(lines[3].contains("1 of 2 credential(s) available"));
        assert!(lines[3].contains("2024-06-02"));
    }

    #[test]
    fn test_format_quota_without_credentials() {
        let formatter = TextFormatter::new(false);
        let output = formatter.format_quota(ProviderKind::Mailchimp, &[], "requests");
        assert!(output.contains("No credentials configured"));
    }

    #[test]
    fn test_format_status() {
        let formatter = TextFormatter::new(false);
        let mut checkpoint = SyncCheckpoint::new(ProviderKind::Airtable);
        checkpoint.cursor = Some("itrXYZ".into());
        checkpoint.full_scan_cursor = Some("itrABC".into());
        checkpoint.last_run_status = Some(RunStatus::Partial);
        checkpoint.consecutive_failures = 2;

        let status = SyncStatus {
            provider: ProviderKind::Airtable,
            state: ProviderState::Idle,
            active_job: None,
            last_job: Some(finished_job()),
            checkpoint: Some(checkpoint),
            consecutive_failures: 2,
            backoff_until: None,
        };
        let output = formatter.format_status(&status);

        assert!(output.starts_with("Airtable idle"));
        assert!(output.contains("never (partial)"));
        assert!(output.contains("Cursor:      itrXYZ"));
        assert!(output.contains("Full rescan: at itrABC"));
        assert!(output.contains("Failures:    2"));
        assert!(output.contains("148 upserted"));
    }
}

#[cfg(test)]
mod json_formatter_tests {
    use super::super::json::JsonFormatter;
    use super::*;
    use tributary_sync::SyncOutcome;

    #[test]
    fn test_sync_result_single_is_object() {
        let formatter = JsonFormatter::new(false);
        let results = vec![(
            ProviderKind::YouTube,
            Ok(SyncOutcome::Completed(finished_job())),
        )];
        let output = formatter.format_sync_results(&results).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value["provider"], "youtube");
        assert_eq!(value["result"]["outcome"], "completed");
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_sync_results_keep_errors() {
        let formatter = JsonFormatter::new(false);
        let results = vec![
            (
                ProviderKind::GitHub,
                Ok(SyncOutcome::BackedOff {
                    until: None,
                    consecutive_failures: 3,
                }),
            ),
            (ProviderKind::Mailchimp, Err("No adapter registered for mailchimp".to_string())),
        ];
        let output = formatter.format_sync_results(&results).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        let items = value.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["result"]["outcome"], "backed_off");
        assert_eq!(items[0]["result"]["consecutive_failures"], 3);
        assert_eq!(items[1]["provider"], "mailchimp");
        assert!(items[1]["error"].as_str().unwrap().contains("No adapter"));
    }

    #[test]
    fn test_providers_output_camel_case() {
        let formatter = JsonFormatter::new(false);
        let output = formatter
            .format_providers(
                tributary_providers::ProviderRegistry::all(),
                &tributary_store::Config::default(),
            )
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        let first = &value.as_array().unwrap()[0];
        assert!(first.get("displayName").is_some());
        assert!(first.get("defaultDailyLimit").is_some());
        assert_eq!(first["enabled"], false);
        assert_eq!(first["credentials"], 0);
    }
}
