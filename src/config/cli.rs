use crate::domain::model::{Coordinate, Destination, ZipCode};
use crate::utils::error::{EligibilityError, Result};
use crate::utils::validation::{self, Validate};
use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "delivery-check")]
#[command(about = "Check whether vendors can deliver to a destination")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "delivery.toml")]
    pub config: String,

    /// Vendor to check (repeat for a whole cart)
    #[arg(long = "vendor", required = true)]
    pub vendors: Vec<String>,

    /// Destination postal code (5 digits)
    #[arg(long)]
    pub zip: Option<String>,

    /// Destination colonia, needed when the postal code is shared
    #[arg(long, requires = "zip")]
    pub colonia: Option<String>,

    #[arg(long, requires = "lng", allow_hyphen_values = true)]
    pub lat: Option<f64>,

    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    pub lng: Option<f64>,

    #[arg(long, help = "Print decisions as JSON")]
    pub json: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Write logs as JSON lines to stderr")]
    pub log_json: bool,
}

impl CliConfig {
    /// 由命令列參數組出目的地
    pub fn destination(&self) -> Result<Destination> {
        let zip_code = self.zip.as_deref().map(ZipCode::parse).transpose()?;
        let coordinate = match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Some(Coordinate::new(lat, lng)?),
            _ => None,
        };
        let colonia = self
            .colonia
            .as_ref()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        match (zip_code, coordinate) {
            (Some(zip_code), Some(coordinate)) => Ok(Destination::Address {
                zip_code,
                colonia,
                coordinate,
            }),
            (Some(zip_code), None) => Ok(Destination::Postal { zip_code, colonia }),
            (None, Some(coordinate)) => Ok(Destination::Point(coordinate)),
            (None, None) => Err(EligibilityError::MissingConfigError {
                field: "--zip or --lat/--lng".to_string(),
            }),
        }
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_path("config", &self.config)?;
        for vendor in &self.vendors {
            validation::validate_non_empty_string("vendor", vendor)?;
        }
        self.destination().map(|_| ())
    }
}
