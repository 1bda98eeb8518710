// Analytics server: ingests the ciphertexts of the expected clients, adds
// them homomorphically, and decrypts the total and the average.

use std::{env, error::Error, process::exit};

use console::style;
use secagg::config::AggregationConfig;
use secagg::metrics::Stage;
use secagg::pipeline::run_round;
use secagg::{bfv::BfvScheme, FoldStrategy};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

fn print_notice_and_exit(error: Option<String>) {
    println!(
        "{} Analytics server",
        style("  overview:").magenta().bold()
    );
    println!(
        "{} server [-h] [--help] [--config=<path>] [--tree] [--json]",
        style("     usage:").magenta().bold()
    );
    if let Some(error) = error {
        println!("{} {}", style("     error:").red().bold(), error);
    }
    exit(0);
}

fn main() -> Result<(), Box<dyn Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config_path = "config.json".to_string();
    let mut strategy = FoldStrategy::Sequential;
    let mut json = false;
    for arg in env::args().skip(1) {
        if arg == "-h" || arg == "--help" {
            print_notice_and_exit(None)
        } else if let Some(path) = arg.strip_prefix("--config=") {
            config_path = path.to_string()
        } else if arg == "--tree" {
            strategy = FoldStrategy::Tree
        } else if arg == "--json" {
            json = true
        } else {
            print_notice_and_exit(Some(format!("Unrecognized argument: {arg}")))
        }
    }

    let config = AggregationConfig::from_path(&config_path)?;
    println!("# Analytics server");
    println!("\t{} clients expected", config.num_clients);

    let report = run_round::<BfvScheme>(&config, strategy)?;
    for skipped in &report.skipped {
        println!(
            "{} skipped client {}: {}",
            style("   warning:").yellow().bold(),
            skipped.client_id,
            skipped.reason
        );
    }

    for (stage, label) in [
        (Stage::Deserialization, "Deserialization Time (all clients)"),
        (Stage::Computation, "Computation Time (aggregation)"),
        (Stage::Decryption, "Decryption Time"),
    ] {
        if let Some(elapsed) = report.timings.get(stage) {
            println!(
                "{} {label}: {} μs",
                style("[METRIC]").green().bold(),
                elapsed.as_micros()
            );
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report.result)?);
    } else {
        println!("\n## Results");
        println!("\tTotal Energy Consumption: {:.4} kWh", report.result.total);
        println!("\tAverage Energy Consumption: {:.4} kWh", report.result.average);
        println!("\tNumber of Clients: {}", report.result.contributor_count);
    }
    Ok(())
}
