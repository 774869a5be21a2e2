use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

use itemstat_core::analysis::analyze;
use itemstat_core::descriptive::describe;
use itemstat_core::dif::{self, DifPolicy};
use itemstat_core::matrix::{Cell, ResponseMatrix, StudentRow};
use itemstat_core::model::{Demographics, Item, ItemMetadata};
use itemstat_core::reliability::{cronbach_alpha, split_half};

/// Students answer correctly with a probability that grows with a random
/// ability, so items correlate with the total like real data.
fn make_matrix(students: usize, items: usize) -> ResponseMatrix {
    let mut rng = StdRng::seed_from_u64(7);
    let items_vec: Vec<Item> = (0..items)
        .map(|i| Item {
            id: i as u64 + 1,
            code: format!("Q{}", i + 1),
            metadata: ItemMetadata::multiple_choice("A"),
            content_domain: None,
        })
        .collect();

    let students_vec = (0..students)
        .map(|s| {
            let ability: f64 = rng.gen_range(0.1..0.9);
            let cells: Vec<Cell> = (0..items)
                .map(|_| {
                    let ok = rng.gen_bool(ability);
                    Cell {
                        raw_value: if ok { "A" } else { "B" }.to_string(),
                        is_correct: ok,
                        points: if ok { 1.0 } else { 0.0 },
                    }
                })
                .collect();
            StudentRow {
                id: s as u64 + 1,
                code: format!("S{s}"),
                demographics: Demographics {
                    gender: Some(if s % 2 == 0 { "M" } else { "F" }.to_string()),
                    country: Some(["GRD", "LCA", "DMA"][s % 3].to_string()),
                    ..Demographics::default()
                },
                total_score: cells.iter().map(|c| c.points).sum(),
                cells,
            }
        })
        .collect();

    ResponseMatrix {
        assessment_id: Uuid::nil(),
        items: items_vec,
        students: students_vec,
    }
}

fn bench_reliability(c: &mut Criterion) {
    let mut group = c.benchmark_group("reliability");
    let matrix = make_matrix(2000, 40);
    let rows = matrix.points_rows();

    group.bench_function("cronbach_alpha_2000x40", |b| {
        b.iter(|| cronbach_alpha(black_box(&rows)))
    });
    group.bench_function("split_half_2000x40", |b| {
        b.iter(|| split_half(black_box(&rows)))
    });
    group.finish();
}

fn bench_describe(c: &mut Criterion) {
    let totals = make_matrix(5000, 10).totals();
    c.bench_function("describe_5000", |b| b.iter(|| describe(black_box(&totals))));
}

fn bench_analyze(c: &mut Criterion) {
    let mut group = c.benchmark_group("analyze");
    let policy = DifPolicy::default();

    for (label, students, items) in [("200x20", 200, 20), ("2000x40", 2000, 40)] {
        let matrix = make_matrix(students, items);
        group.bench_function(label, |b| {
            b.iter(|| analyze(black_box(&matrix), black_box(&policy)))
        });
    }

    let matrix = make_matrix(2000, 40);
    group.bench_function("country_dif_2000x40", |b| {
        b.iter(|| dif::country_dif(black_box(&matrix), black_box(&policy)))
    });

    group.finish();
}

criterion_group!(benches, bench_reliability, bench_describe, bench_analyze);
criterion_main!(benches);
