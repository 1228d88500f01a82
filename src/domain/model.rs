use crate::utils::error::{EligibilityError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 經緯度座標 (WGS84, 十進位度數)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Creates a validated coordinate.
    ///
    /// Returns `Err(EligibilityError::InvalidCoordinate)` when either component
    /// is not finite or is out of range.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(EligibilityError::InvalidCoordinate {
                message: format!("latitude {} out of range [-90, 90]", latitude),
            });
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(EligibilityError::InvalidCoordinate {
                message: format!("longitude {} out of range [-180, 180]", longitude),
            });
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Creates a coordinate without validation. Use with trusted inputs only.
    #[inline]
    pub const fn new_unchecked(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        Self::new(self.latitude, self.longitude).is_ok()
    }
}

/// 五位數郵遞區號
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ZipCode(String);

impl ZipCode {
    pub fn parse(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        if trimmed.len() == 5 && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(EligibilityError::InvalidZipCode {
                value: value.to_string(),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ZipCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ZipCode {
    type Error = EligibilityError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ZipCode> for String {
    fn from(zip: ZipCode) -> Self {
        zip.0
    }
}

/// A colonia selected for allow-list delivery, identified by name and zip.
///
/// Its wire form (`polanco-11510`) is produced and parsed only by
/// [`crate::core::colonia_key`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColoniaKey {
    pub colonia_name: String,
    pub zip_code: ZipCode,
}

/// Delivery configuration of one vendor. Exactly one mode is active.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ServiceArea {
    Radius {
        center: Coordinate,
        radius_km: f64,
    },
    /// Keys are kept in wire form; a malformed entry must not hide the others.
    Allowlist {
        colonia_keys: Vec<String>,
    },
    #[default]
    Unconfigured,
}

impl ServiceArea {
    pub fn mode_name(&self) -> &'static str {
        match self {
            Self::Radius { .. } => "radius",
            Self::Allowlist { .. } => "allowlist",
            Self::Unconfigured => "unconfigured",
        }
    }
}

/// 郵遞區號目錄中的一筆資料 (一個郵遞區號可對應多個 colonia)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZipCodeRecord {
    pub zip_code: ZipCode,
    pub colonia: String,
    pub municipality: String,
    pub state: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub centroid: Option<Coordinate>,
}

impl ZipCodeRecord {
    /// Mean of the known centroids; `None` when no record carries one.
    pub fn mean_centroid(records: &[ZipCodeRecord]) -> Option<Coordinate> {
        let centroids: Vec<Coordinate> = records.iter().filter_map(|r| r.centroid).collect();
        if centroids.is_empty() {
            return None;
        }

        let n = centroids.len() as f64;
        let latitude = centroids.iter().map(|c| c.latitude).sum::<f64>() / n;
        let longitude = centroids.iter().map(|c| c.longitude).sum::<f64>() / n;
        Some(Coordinate::new_unchecked(latitude, longitude))
    }
}

/// Where the customer wants the order delivered.
#[derive(Debug, Clone, PartialEq)]
pub enum Destination {
    Postal {
        zip_code: ZipCode,
        colonia: Option<String>,
    },
    Point(Coordinate),
    Address {
        zip_code: ZipCode,
        colonia: Option<String>,
        coordinate: Coordinate,
    },
}

impl Destination {
    pub fn postal(zip_code: ZipCode) -> Self {
        Self::Postal {
            zip_code,
            colonia: None,
        }
    }

    pub fn postal_with_colonia(zip_code: ZipCode, colonia: impl Into<String>) -> Self {
        Self::Postal {
            zip_code,
            colonia: Some(colonia.into()),
        }
    }

    pub fn zip_code(&self) -> Option<&ZipCode> {
        match self {
            Self::Postal { zip_code, .. } | Self::Address { zip_code, .. } => Some(zip_code),
            Self::Point(_) => None,
        }
    }

    pub fn colonia(&self) -> Option<&str> {
        match self {
            Self::Postal { colonia, .. } | Self::Address { colonia, .. } => colonia.as_deref(),
            Self::Point(_) => None,
        }
    }

    pub fn coordinate(&self) -> Option<Coordinate> {
        match self {
            Self::Point(c) | Self::Address { coordinate: c, .. } => Some(*c),
            Self::Postal { .. } => None,
        }
    }

    /// 為只有郵遞區號的目的地補上座標
    pub fn with_coordinate(self, coordinate: Coordinate) -> Self {
        match self {
            Self::Postal { zip_code, colonia } | Self::Address { zip_code, colonia, .. } => {
                Self::Address {
                    zip_code,
                    colonia,
                    coordinate,
                }
            }
            Self::Point(_) => Self::Point(coordinate),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    NoServiceAreaConfigured,
    InvalidServiceArea,
    WithinRadius,
    OutsideRadius,
    MissingDestinationCoordinate,
    WithinAllowlist,
    OutsideAllowlist,
    MissingDestinationZipCode,
    ColoniaRequired,
}

/// How a caller should react to a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasonCategory {
    Eligible,
    /// A legitimate rejection: show the message.
    OutsideArea,
    /// The vendor has no usable delivery configuration.
    Configuration,
    /// The destination lacks what the vendor's mode needs; ask the user for it.
    Input,
}

impl ReasonCode {
    pub fn category(&self) -> ReasonCategory {
        match self {
            Self::WithinRadius | Self::WithinAllowlist => ReasonCategory::Eligible,
            Self::OutsideRadius | Self::OutsideAllowlist => ReasonCategory::OutsideArea,
            Self::NoServiceAreaConfigured | Self::InvalidServiceArea => {
                ReasonCategory::Configuration
            }
            Self::MissingDestinationCoordinate
            | Self::MissingDestinationZipCode
            | Self::ColoniaRequired => ReasonCategory::Input,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoServiceAreaConfigured => "NO_SERVICE_AREA_CONFIGURED",
            Self::InvalidServiceArea => "INVALID_SERVICE_AREA",
            Self::WithinRadius => "WITHIN_RADIUS",
            Self::OutsideRadius => "OUTSIDE_RADIUS",
            Self::MissingDestinationCoordinate => "MISSING_DESTINATION_COORDINATE",
            Self::WithinAllowlist => "WITHIN_ALLOWLIST",
            Self::OutsideAllowlist => "OUTSIDE_ALLOWLIST",
            Self::MissingDestinationZipCode => "MISSING_DESTINATION_ZIP_CODE",
            Self::ColoniaRequired => "COLONIA_REQUIRED",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityDecision {
    pub deliverable: bool,
    pub distance_km: Option<f64>,
    pub service_radius_km: Option<f64>,
    pub reason_code: ReasonCode,
    pub message: String,
}

impl EligibilityDecision {
    pub fn rejected(reason_code: ReasonCode, message: impl Into<String>) -> Self {
        Self {
            deliverable: false,
            distance_km: None,
            service_radius_km: None,
            reason_code,
            message: message.into(),
        }
    }

    pub fn category(&self) -> ReasonCategory {
        self.reason_code.category()
    }

    /// True when the caller should ask for a different destination input
    /// instead of showing a rejection.
    pub fn needs_more_input(&self) -> bool {
        self.category() == ReasonCategory::Input
    }
}
