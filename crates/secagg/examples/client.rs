// A smart meter: draws a simulated hourly consumption, encrypts it under the
// shared public key and writes the ciphertext where the server expects it.

use std::{env, error::Error, process::exit, sync::Arc};

use console::style;
use rand::rng;
use secagg::client::{encrypt_readings, simulated_reading, write_contribution};
use secagg::distribution::load_public_keys;
use secagg::metrics::{Stage, StageTimings};
use secagg::{bfv::BfvScheme, config::AggregationConfig, ClientId};
use secagg_traits::SchemeBase;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

fn print_notice_and_exit(error: Option<String>) {
    println!(
        "{} Smart meter client",
        style("  overview:").magenta().bold()
    );
    println!(
        "{} client [-h] [--help] <client_id> [--config=<path>] [--reading=<kWh>]",
        style("     usage:").magenta().bold()
    );
    println!(
        "{} {} must be between 1 and num_clients",
        style("constraints:").magenta().bold(),
        style("client_id").blue(),
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
    let mut client_id = None;
    let mut reading = None;
    for arg in env::args().skip(1) {
        if arg == "-h" || arg == "--help" {
            print_notice_and_exit(None)
        } else if let Some(path) = arg.strip_prefix("--config=") {
            config_path = path.to_string()
        } else if let Some(value) = arg.strip_prefix("--reading=") {
            match value.parse::<f64>() {
                Ok(value) => reading = Some(value),
                Err(_) => print_notice_and_exit(Some("Invalid `--reading` argument".to_string())),
            }
        } else {
            match arg.parse::<ClientId>() {
                Ok(id) => client_id = Some(id),
                Err(_) => print_notice_and_exit(Some(format!("Unrecognized argument: {arg}"))),
            }
        }
    }
    let Some(client_id) = client_id else {
        print_notice_and_exit(Some("Missing client id".to_string()));
        return Ok(());
    };

    let config = AggregationConfig::from_path(&config_path)?;
    if client_id.get() > config.num_clients {
        print_notice_and_exit(Some(format!(
            "Client id {client_id} exceeds num_clients = {}",
            config.num_clients
        )))
    }
    let parameters = Arc::new(config.parameters()?);
    let scheme = BfvScheme::try_new(&parameters)?;
    let keys = load_public_keys(&config.key_store(), &scheme)?;

    let reading = reading.unwrap_or_else(|| simulated_reading(&mut rng()));
    println!("# Client {client_id}");
    println!("\treading = {reading:.4} kWh");

    let mut timings = StageTimings::new();
    let bytes = encrypt_readings(&scheme, &keys, &[reading], &mut rng(), &mut timings)?;
    let path = write_contribution(&config.source_resolver(), client_id, &bytes)?;
    println!("\tciphertext -> {} ({} bytes)", path.display(), bytes.len());

    if let Some(elapsed) = timings.get(Stage::Encryption) {
        println!(
            "{} Encryption Time: {} μs",
            style("[METRIC]").green().bold(),
            elapsed.as_micros()
        );
    }
    Ok(())
}
