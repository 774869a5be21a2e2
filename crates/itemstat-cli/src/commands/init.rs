//! The `itemstat init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("itemstat.toml").exists() {
        println!("itemstat.toml already exists, skipping.");
    } else {
        std::fs::write("itemstat.toml", SAMPLE_CONFIG)?;
        println!("Created itemstat.toml");
    }

    std::fs::create_dir_all("responses")?;
    let example_path = std::path::Path::new("responses/example.csv");
    if example_path.exists() {
        println!("responses/example.csv already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_RESPONSES)?;
        println!("Created responses/example.csv");
    }

    println!("\nNext steps:");
    println!("  1. Run: itemstat validate --file responses/example.csv");
    println!("  2. Run: itemstat analyze --file responses/example.csv");
    println!("  3. Run: itemstat ingest --file responses/example.csv --year 2024");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# itemstat configuration

[store]
type = "json"
path = "./itemstat-data"
max_retries = 3
retry_delay_ms = 500
parallelism = 4
response_chunk_size = 10000
output_dir = "./itemstat-results"

[dif]
min_group_size = 10
negligible_below = 0.05
moderate_below = 0.10
"#;

const EXAMPLE_RESPONSES: &str = "Example Mathematics Assessment,,,,,,,
,,KEY,B,D,A,C,2
ID,Country,Sex,Q1,Q2,Q3,Q4,Q5
E01,GRD,F,B,D,A,C,2
E02,GRD,M,B,D,A,B,2
E03,GRD,F,B,D,C,C,1
E04,GRD,M,B,A,A,C,2
E05,GRD,F,B,D,A,A,1
E06,GRD,M,A,D,A,C,1
E07,LCA,F,B,B,A,D,1
E08,LCA,M,B,D,B,C,0
E09,LCA,F,C,D,A,B,1
E10,LCA,M,B,A,C,C,0
E11,LCA,F,A,C,A,B,0
E12,LCA,M,D,B,D,A,0
";
