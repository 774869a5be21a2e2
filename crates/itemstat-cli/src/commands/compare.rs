//! The `itemstat compare` command.

use std::path::PathBuf;

use anyhow::Result;

use itemstat_core::report::AnalysisReport;

use crate::render::fixed;

pub fn execute(
    baseline_path: PathBuf,
    current_path: PathBuf,
    threshold: f64,
    fail_on_shift: bool,
    format: String,
) -> Result<()> {
    anyhow::ensure!(threshold >= 0.0, "threshold must not be negative");

    let baseline = AnalysisReport::load_json(&baseline_path)?;
    let current = AnalysisReport::load_json(&current_path)?;

    let report = current.compare(&baseline, threshold);

    match format.as_str() {
        "markdown" | "md" => {
            println!("{}", report.to_markdown());
        }
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            println!(
                "Comparison: {} harder, {} easier, {} unchanged",
                report.harder.len(),
                report.easier.len(),
                report.unchanged
            );
            println!(
                "Mean score: {}% -> {}% of max",
                fixed(report.trend.baseline_mean_percent, 1),
                fixed(report.trend.current_mean_percent, 1)
            );
            if let Some(alpha) = report.trend.alpha_change {
                println!("Cronbach's alpha change: {alpha:+.3}");
            }

            for (title, shifts) in [("Harder", &report.harder), ("Easier", &report.easier)] {
                if shifts.is_empty() {
                    continue;
                }
                println!("\n{title}:");
                for s in shifts {
                    println!(
                        "  {} p {:.2} -> {:.2} ({:+.2})",
                        s.item_code, s.baseline_difficulty, s.current_difficulty, s.delta
                    );
                }
            }

            if !report.new_items.is_empty() {
                println!("\n{} new item(s): {}", report.new_items.len(), report.new_items.join(", "));
            }
            if !report.removed_items.is_empty() {
                println!(
                    "{} removed item(s): {}",
                    report.removed_items.len(),
                    report.removed_items.join(", ")
                );
            }
        }
    }

    if fail_on_shift && report.has_shifts() {
        std::process::exit(1);
    }

    Ok(())
}
