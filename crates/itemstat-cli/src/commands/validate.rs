//! The `itemstat validate` command.

use std::path::PathBuf;

use anyhow::Result;

use itemstat_core::engine::score_parsed;
use itemstat_core::grid::Grid;
use itemstat_core::parser::parse_grid;

pub fn execute(file: PathBuf) -> Result<()> {
    let grid = Grid::from_csv_path(&file)?;
    let parsed = match parse_grid(&grid) {
        Ok(parsed) => parsed,
        Err(e) => {
            let problems = e.messages();
            for p in &problems {
                eprintln!("  ERROR: {p}");
            }
            anyhow::bail!(
                "{} is not a valid response file ({} problem(s))",
                file.display(),
                problems.len()
            );
        }
    };
    let summary = &parsed.summary;

    println!(
        "Response file: {} ({} students, {} items)",
        file.display(),
        summary.total_students,
        summary.total_items
    );
    println!(
        "  KEY row {}, header row {}",
        summary.key_row + 1,
        summary.header_row + 1
    );
    println!(
        "  {} multiple-choice, {} constructed-response, {} points{}",
        summary.mc_count,
        summary.cr_count,
        summary.total_points,
        if summary.is_weighted { " (weighted)" } else { "" }
    );

    let (_, scoring) = score_parsed(&parsed);
    if scoring.unparsable_responses > 0 {
        println!(
            "  WARNING: {} constructed responses are not numbers and score zero",
            scoring.unparsable_responses
        );
    }
    for w in &parsed.warnings {
        println!("  WARNING: {w}");
    }

    if parsed.students.is_empty() {
        anyhow::bail!("no student rows with an ID were found in {}", file.display());
    }

    if parsed.warnings.is_empty() && scoring.unparsable_responses == 0 {
        println!("File valid.");
    } else {
        let count = parsed.warnings.len() + usize::from(scoring.unparsable_responses > 0);
        println!("\n{count} warning(s) found.");
    }

    Ok(())
}
