// Key generation center: generates the key set once and writes the three
// key files named in the configuration.
//
// The public and evaluation keys go to the clients and the aggregator; the
// secret key only to the decrypting party.

use std::{env, error::Error, process::exit, sync::Arc};

use console::style;
use rand::rng;
use secagg::{bfv::BfvScheme, config::AggregationConfig, KeyGenerationCenter, KeyKind};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

fn print_notice_and_exit(error: Option<String>) {
    println!(
        "{} Key generation center",
        style("  overview:").magenta().bold()
    );
    println!(
        "{} keygen [-h] [--help] [--config=<path>]",
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
    for arg in env::args().skip(1) {
        if arg == "-h" || arg == "--help" {
            print_notice_and_exit(None)
        } else if let Some(path) = arg.strip_prefix("--config=") {
            config_path = path.to_string()
        } else {
            print_notice_and_exit(Some(format!("Unrecognized argument: {arg}")))
        }
    }

    let config = AggregationConfig::from_path(&config_path)?;
    let parameters = Arc::new(config.parameters()?);
    println!("# Key generation");
    println!("\tpoly_modulus_degree = {}", parameters.poly_modulus_degree());
    println!("\tcoeff_modulus_bits = {:?}", parameters.coeff_modulus_bits());
    println!("\tscale_bits = {}", parameters.scale_bits());
    println!("\tplaintext_bits = {}", parameters.plaintext_bits());

    let mut kgc = KeyGenerationCenter::<BfvScheme>::new(&parameters)?;
    let key_id = *kgc.generate(&mut rng())?.key_id();
    let mut store = config.key_store();
    kgc.persist(&mut store)?;

    println!("\tkey set = {key_id}");
    for kind in KeyKind::ALL {
        println!("\t{kind} -> {}", store.path(kind).display());
    }
    for (stage, elapsed) in kgc.timings().iter() {
        println!(
            "{} {stage}: {:.3} ms",
            style("[METRIC]").green().bold(),
            elapsed.as_secs_f64() * 1000.0
        );
    }
    Ok(())
}
