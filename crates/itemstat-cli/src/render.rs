//! Terminal tables for analysis results.

use comfy_table::{Cell, Table};

use itemstat_core::model::DifRecord;
use itemstat_core::report::AnalysisReport;

/// Format an optional statistic with a fixed number of decimals.
pub fn fixed(value: Option<f64>, digits: usize) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.digits$}"))
}

fn band<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

pub fn print_report(report: &AnalysisReport) {
    let subject = &report.assessment;
    let test = &report.analysis.test;

    println!(
        "Assessment: {} ({} students, {} items, max score {})",
        subject.name, subject.student_count, subject.item_count, test.max_score
    );
    if let Some(year) = subject.year {
        println!("Year: {year}");
    }

    let mut summary = Table::new();
    summary.set_header(vec!["Statistic", "Value"]);
    if let Some(d) = &test.descriptive {
        summary.add_row(vec![Cell::new("Mean"), Cell::new(format!("{:.2}", d.mean))]);
        summary.add_row(vec![Cell::new("Median"), Cell::new(format!("{:.2}", d.median))]);
        summary.add_row(vec![Cell::new("Mode"), Cell::new(format!("{:.2}", d.mode))]);
        summary.add_row(vec![Cell::new("Std dev"), Cell::new(fixed(d.stdev, 2))]);
        summary.add_row(vec![Cell::new("Min / Max"), Cell::new(format!("{} / {}", d.min, d.max))]);
        summary.add_row(vec![
            Cell::new("Skewness"),
            Cell::new(format!(
                "{} {}",
                fixed(d.skewness, 3),
                band(report.distribution.skewness_shape)
            )),
        ]);
        summary.add_row(vec![
            Cell::new("Kurtosis"),
            Cell::new(format!(
                "{} {}",
                fixed(d.kurtosis, 3),
                band(report.distribution.kurtosis_shape)
            )),
        ]);
    }
    let r = &test.reliability;
    summary.add_row(vec![
        Cell::new("Cronbach's alpha"),
        Cell::new(format!("{} {}", fixed(r.cronbach_alpha, 3), band(r.alpha_band))),
    ]);
    summary.add_row(vec![
        Cell::new("Split-half"),
        Cell::new(format!("{} {}", fixed(r.split_half, 3), band(r.split_half_band))),
    ]);
    summary.add_row(vec![Cell::new("SEM"), Cell::new(fixed(r.sem, 3))]);
    println!("\n{summary}");

    if let Some(performance) = &report.analysis.performance {
        let mut levels = Table::new();
        levels.set_header(vec!["Performance level", "Students", "%"]);
        for l in &performance.levels {
            levels.add_row(vec![
                Cell::new(l.level),
                Cell::new(l.count),
                Cell::new(format!("{:.1}", l.percentage)),
            ]);
        }
        println!("\n{levels}");
        println!("At or above MPL: {:.1}%", performance.sdg_mpl_percentage);
    }

    let mut items = Table::new();
    items.set_header(vec![
        "Item",
        "Type",
        "p",
        "Difficulty",
        "D",
        "Discrimination",
        "r_pb",
        "Status",
    ]);
    for item in &report.analysis.items {
        items.add_row(vec![
            Cell::new(&item.item_code),
            Cell::new(item.item_type),
            Cell::new(fixed(item.difficulty, 2)),
            Cell::new(band(item.difficulty_band)),
            Cell::new(fixed(item.discrimination, 2)),
            Cell::new(band(item.discrimination_band)),
            Cell::new(fixed(item.point_biserial, 2)),
            Cell::new(item.status),
        ]);
    }
    println!("\n{items}");

    if !report.genders.is_empty() {
        let mut genders = Table::new();
        genders.set_header(vec!["Gender", "Students", "Mean", "Std dev", "Above MPL %"]);
        for g in &report.genders {
            genders.add_row(vec![
                Cell::new(&g.gender),
                Cell::new(g.count),
                Cell::new(format!("{:.2}", g.mean_score)),
                Cell::new(format!("{:.2}", g.std_dev)),
                Cell::new(format!("{:.1}", g.mpl_percentage)),
            ]);
        }
        println!("\n{genders}");
    }

    if !report.analysis.dif.is_empty() {
        println!();
        print_dif(&report.analysis.dif);
    }
}

pub fn print_dif(records: &[DifRecord]) {
    let mut table = Table::new();
    table.set_header(vec![
        "Item",
        "Type",
        "Groups",
        "Difficulty",
        "DIF",
        "Classification",
        "n",
    ]);
    for d in records {
        let groups = match &d.country {
            Some(country) => format!("{country}: {} vs {}", d.group_a, d.group_b),
            None => format!("{} vs {}", d.group_a, d.group_b),
        };
        table.add_row(vec![
            Cell::new(&d.item_code),
            Cell::new(d.dif_type),
            Cell::new(groups),
            Cell::new(format!("{:.2} / {:.2}", d.difficulty_a, d.difficulty_b)),
            Cell::new(format!("{:+.3}", d.dif_score)),
            Cell::new(d.classification),
            Cell::new(format!("{} / {}", d.sample_size_a, d.sample_size_b)),
        ]);
    }
    println!("{table}");
}
