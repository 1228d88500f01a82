// Adapters layer: concrete implementations of the domain ports (csv files, REST tables, config).

pub mod csv_directory;
pub mod http_directory;
pub mod service_area_store;

pub use csv_directory::CsvZipDirectory;
pub use http_directory::HttpZipDirectory;
pub use service_area_store::{HttpServiceAreaStore, StaticServiceAreaStore};

use crate::domain::model::{Coordinate, ZipCode, ZipCodeRecord};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

/// Runs a PostgREST query and parses the JSON array it answers with.
///
/// Transport failures, timeouts, non-2xx statuses and unparsable bodies all
/// come back as `Err` with a description for the caller's error variant.
pub(crate) async fn fetch_rows<T: DeserializeOwned>(
    request: postgrest::Builder,
    timeout: Duration,
) -> std::result::Result<Vec<T>, String> {
    let fetch = async {
        let response = request.execute().await.map_err(|e| e.to_string())?;
        let status = response.status();
        tracing::debug!("API response status: {}", status);
        if !status.is_success() {
            return Err(format!("HTTP {}", status));
        }
        response.text().await.map_err(|e| e.to_string())
    };

    let body = tokio::time::timeout(timeout, fetch)
        .await
        .map_err(|_| format!("no answer within {:?}", timeout))??;

    // 先解析成 Value，欄位層級的錯誤 (例如座標格式) 才能個別略過
    let value: serde_json::Value = serde_json::from_str(&body).map_err(|e| e.to_string())?;
    serde_json::from_value(value).map_err(|e| e.to_string())
}

/// One row of postal reference data, as stored in CSV exports and REST tables.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DirectoryRow {
    pub zip_code: String,
    pub colonia: String,
    pub municipality: String,
    pub state: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub longitude: Option<f64>,
}

impl DirectoryRow {
    /// `None` when the zip code is unusable; a bad centroid only drops the centroid.
    pub fn into_record(self) -> Option<ZipCodeRecord> {
        let zip_code = match ZipCode::parse(&self.zip_code) {
            Ok(zip) => zip,
            Err(e) => {
                tracing::warn!("⚠️ Skipping directory row for '{}': {}", self.colonia, e);
                return None;
            }
        };

        let centroid = match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => match Coordinate::new(lat, lng) {
                Ok(c) => Some(c),
                Err(e) => {
                    tracing::warn!("⚠️ Ignoring centroid of {} {}: {}", zip_code, self.colonia, e);
                    None
                }
            },
            _ => None,
        };

        Some(ZipCodeRecord {
            zip_code,
            colonia: self.colonia.trim().to_string(),
            municipality: self.municipality.trim().to_string(),
            state: self.state.trim().to_string(),
            city: self
                .city
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            centroid,
        })
    }
}
