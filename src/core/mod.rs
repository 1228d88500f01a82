pub mod colonia_key;
pub mod evaluator;
pub mod gate;
pub mod geo;

pub use crate::domain::model::{
    ColoniaKey, Coordinate, Destination, EligibilityDecision, ReasonCategory, ReasonCode,
    ServiceArea, ZipCode, ZipCodeRecord,
};
pub use crate::domain::ports::{ServiceAreaStore, ZipCodeDirectory};
pub use crate::utils::error::Result;
