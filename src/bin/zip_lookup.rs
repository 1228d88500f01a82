use anyhow::Context;
use clap::Parser;
use delivery_zones::utils::logger;
use delivery_zones::utils::validation::Validate;
use delivery_zones::{DeliveryConfig, ZipCode, ZipCodeDirectory, ZipCodeRecord};

#[derive(Parser)]
#[command(name = "zip-lookup")]
#[command(about = "List the colonias the directory knows for a postal code")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "delivery.toml")]
    config: String,

    /// Postal code to look up
    zip: String,

    /// Print records as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    let zip = ZipCode::parse(&args.zip)?;
    let config = DeliveryConfig::from_file(&args.config)
        .with_context(|| format!("Failed to load config file '{}'", args.config))?;
    config.validate()?;

    let directory = config.build_directory()?;
    let records = directory.find_by_zip(&zip).await?;
    let centroid = ZipCodeRecord::mean_centroid(&records);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No colonias found for {}", zip);
        return Ok(());
    }

    println!("📮 {} ({} colonias)", zip, records.len());
    for record in &records {
        println!(
            "  - {} · {} · {}{}",
            record.colonia,
            record.municipality,
            record.state,
            record
                .city
                .as_ref()
                .map(|c| format!(" · {}", c))
                .unwrap_or_default()
        );
    }
    if let Some(c) = centroid {
        println!("📍 approx. {:.5}, {:.5}", c.latitude, c.longitude);
    }

    Ok(())
}
