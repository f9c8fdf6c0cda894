//! Console output for a tuning run
//!
//! **Purpose:** Human-readable disclaimer, rankings and end-of-run summary.
//! Everything here returns a `String`; the binary decides where it goes.

use crate::tuning::safety::{RestoreSource, ShutdownReport};
use crate::tuning::search::SearchEnd;
use crate::tuning::store::{Ranking, ResultStore, TOP_K};
use axetune_common::RankedRecord;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// CLI output formatter
pub struct CliFormatter;

impl CliFormatter {
    /// Printed before a coarse sweep starts
    pub fn format_disclaimer() -> String {
        let mut output = String::new();
        output.push_str("\nDISCLAIMER:\n");
        output.push_str("This tool will stress test your device by running it at various voltages and frequencies.\n");
        output.push_str("While safeguards are in place, running hardware outside of standard parameters carries inherent risks.\n");
        output.push_str("Use this tool at your own risk. The author(s) are not responsible for any damage to your hardware.\n");
        output.push_str("\nNOTE: Ambient temperature significantly affects these results. The optimal settings found may not\n");
        output.push_str("work well if room temperature changes substantially. Re-run the benchmark if conditions change.\n");
        output
    }

    /// Ranked table of records
    ///
    /// Example row: `  1. 1160 mV @  640 MHz |  630.00 GH/s | 61.2°C | VR 70.5°C | 16.85 J/TH`
    pub fn format_ranking(title: &str, ranking: &[RankedRecord]) -> String {
        let mut output = String::new();
        output.push_str(&format!("\n{}\n{}\n", title, RULE));

        if ranking.is_empty() {
            output.push_str("  (no results)\n");
            return output;
        }

        for entry in ranking {
            let r = &entry.record;
            let vr = r
                .average_vr_temp
                .map(|vr| format!(" | VR {:.1}°C", vr))
                .unwrap_or_default();
            output.push_str(&format!(
                "{:3}. {} | {:7.2} GH/s | {:.1}°C{} | {:.2} J/TH\n",
                entry.rank, r.candidate, r.average_hash_rate, r.average_temperature, vr, r.efficiency_jth
            ));
        }
        output
    }

    /// Top hashrate and top efficiency tables
    pub fn format_session_summary(store: &ResultStore) -> String {
        let mut output = Self::format_ranking(
            &format!("Top {} Performing Settings", TOP_K),
            &store.top_k(TOP_K, Ranking::Hashrate),
        );
        output.push_str(&Self::format_ranking(
            &format!("Top {} Most Efficient Settings", TOP_K),
            &store.top_k(TOP_K, Ranking::Efficiency),
        ));
        output
    }

    pub fn format_search_end(end: &SearchEnd) -> String {
        let symbol = match end {
            SearchEnd::Exhausted => "✓",
            SearchEnd::CeilingReached(_) | SearchEnd::Interrupted => "⚠",
        };
        format!("[{}] Search finished: {}", symbol, end)
    }

    pub fn format_shutdown(report: &ShutdownReport) -> String {
        match report {
            ShutdownReport::AlreadyDone => "[✓] Device already reset".to_string(),
            ShutdownReport::Restored {
                target,
                source,
                applied,
                results_saved,
                ..
            } => {
                let source = match source {
                    RestoreSource::BestResult => "best result",
                    RestoreSource::DeviceDefaults => "device defaults",
                };
                let mut output = if *applied {
                    format!("[✓] Device set to {} ({})", target, source)
                } else {
                    format!("[✗] Failed to apply {} ({}); restart requested", target, source)
                };
                if *results_saved {
                    output.push_str("\n[✓] Results saved");
                }
                output
            }
        }
    }
}
