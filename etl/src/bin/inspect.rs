use anyhow::{Context, Result};
use arrow::util::pretty::pretty_format_batches;
use sparkify_etl::config::{Config, DEFAULT_CONFIG_PATH};
use sparkify_etl::readback::TableReader;
use sparkify_etl::storage::build_object_store;
use sparkify_etl::writer::OutputTable;
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter("inspect=info,sparkify_etl=info")
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        return Ok(());
    }

    let config_path = std::env::var("SPARKIFY_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = Config::load(&config_path).context("failed to load configuration")?;
    let store = build_object_store(&config.output_data, &config.credentials, false)
        .with_context(|| format!("failed to open {}", config.output_data))?;
    let reader = TableReader::new(store);

    match args[1].as_str() {
        "stats" => {
            show_stats(&reader).await?;
        }
        "table" => {
            let Some(table) = args.get(2).and_then(|name| OutputTable::from_name(name)) else {
                println!("usage: inspect table <songs|artists|users|timetable|songplays> [rows]");
                return Ok(());
            };
            let rows = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(5);
            show_table(&reader, table, rows).await?;
        }
        _ => {
            print_usage();
        }
    }

    Ok(())
}

fn print_usage() {
    println!("sparkify output inspector");
    println!();
    println!("usage:");
    println!("  inspect stats                 - row and file counts for every table");
    println!("  inspect table <name> [rows]   - partitions and sample rows of one table");
    println!();
    println!("reads the output location from $SPARKIFY_CONFIG (default {})", DEFAULT_CONFIG_PATH);
}

async fn show_stats(reader: &TableReader) -> Result<()> {
    println!("output tables:");
    for table in OutputTable::ALL {
        let contents = reader.read(table).await?;
        let status = if contents.complete { "" } else { " (no _SUCCESS marker)" };
        println!(
            "  {:<10} {:>8} rows  {:>5} files{}",
            table.name(),
            contents.num_rows(),
            contents.files.len(),
            status
        );
    }

    Ok(())
}

async fn show_table(reader: &TableReader, table: OutputTable, rows: usize) -> Result<()> {
    let contents = reader.read(table).await?;

    if contents.files.is_empty() {
        println!("no data found for {} under {}", table, table.location());
        return Ok(());
    }

    println!("{} ({}):", table, table.location());
    println!("  total rows: {}", contents.num_rows());
    println!("  files: {}", contents.files.len());
    println!("  complete: {}", contents.complete);

    let partitions = contents.partition_dirs();
    if !partitions.is_empty() {
        println!("\nfirst partitions:");
        for dir in partitions.iter().take(10) {
            println!("  {}", dir);
        }
        if partitions.len() > 10 {
            println!("  ... and {} more", partitions.len() - 10);
        }
    }

    let sample: Vec<_> = contents
        .files
        .iter()
        .flat_map(|f| f.batches.iter())
        .map(|b| b.slice(0, b.num_rows().min(rows)))
        .take(1)
        .collect();
    if !sample.is_empty() {
        println!("\nsample rows:");
        println!("{}", pretty_format_batches(&sample)?);
    }

    Ok(())
}
