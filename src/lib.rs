pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{CsvZipDirectory, HttpServiceAreaStore, HttpZipDirectory, StaticServiceAreaStore};
pub use config::DeliveryConfig;
pub use core::evaluator::{DirectoryView, EligibilityEvaluator};
pub use core::gate::{CartAdmissionGate, CheckoutAdmission, VendorDecision};
pub use domain::model::{
    ColoniaKey, Coordinate, Destination, EligibilityDecision, ReasonCategory, ReasonCode,
    ServiceArea, ZipCode, ZipCodeRecord,
};
pub use domain::ports::{ServiceAreaStore, ZipCodeDirectory};
pub use utils::error::{EligibilityError, Result};
