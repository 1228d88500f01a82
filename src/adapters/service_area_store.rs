use crate::adapters::fetch_rows;
use crate::domain::model::{Coordinate, ServiceArea};
use crate::domain::ports::ServiceAreaStore;
use crate::utils::error::{EligibilityError, Result};
use async_trait::async_trait;
use postgrest::Postgrest;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Service areas declared up front, e.g. in the `[vendors]` config section.
#[derive(Debug, Clone, Default)]
pub struct StaticServiceAreaStore {
    areas: HashMap<String, ServiceArea>,
}

impl StaticServiceAreaStore {
    pub fn new(areas: HashMap<String, ServiceArea>) -> Self {
        Self { areas }
    }

    pub fn vendor_ids(&self) -> impl Iterator<Item = &str> {
        self.areas.keys().map(String::as_str)
    }
}

#[async_trait]
impl ServiceAreaStore for StaticServiceAreaStore {
    async fn service_area(&self, vendor_id: &str) -> Result<Option<ServiceArea>> {
        Ok(self.areas.get(vendor_id).cloned())
    }
}

/// Vendor row as stored by the dashboard: every mode's columns are nullable.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct VendorRow {
    #[serde(default)]
    pub delivery_mode: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub radius_km: Option<f64>,
    #[serde(default)]
    pub colonia_keys: Option<Vec<String>>,
}

impl VendorRow {
    /// Folds nullable columns into exactly one mode. Rows that do not describe
    /// a usable mode become `Unconfigured`.
    pub fn into_service_area(self, vendor_id: &str) -> ServiceArea {
        let radius = match (self.latitude, self.longitude, self.radius_km) {
            (Some(lat), Some(lng), Some(radius_km)) => Coordinate::new(lat, lng)
                .ok()
                .map(|center| ServiceArea::Radius { center, radius_km }),
            _ => None,
        };
        let allowlist = self
            .colonia_keys
            .filter(|keys| !keys.is_empty())
            .map(|colonia_keys| ServiceArea::Allowlist { colonia_keys });

        let mode = self.delivery_mode.as_deref().map(str::trim).unwrap_or("");
        let area = match mode {
            "radius" => radius,
            "allowlist" | "colonias" => allowlist,
            "" => match (radius, allowlist) {
                (Some(r), None) => Some(r),
                (None, Some(a)) => Some(a),
                (Some(_), Some(_)) => {
                    tracing::warn!(
                        "⚠️ Vendor {} has both radius and allow-list data but no mode",
                        vendor_id
                    );
                    None
                }
                (None, None) => return ServiceArea::Unconfigured,
            },
            other => {
                tracing::warn!("⚠️ Vendor {} has unknown delivery mode '{}'", vendor_id, other);
                None
            }
        };

        area.unwrap_or_else(|| {
            tracing::warn!(
                "⚠️ Vendor {} delivery settings are incomplete; treating as unconfigured",
                vendor_id
            );
            ServiceArea::Unconfigured
        })
    }
}

/// Reads vendor delivery settings from a hosted PostgREST table.
pub struct HttpServiceAreaStore {
    client: Postgrest,
    table: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpServiceAreaStore {
    pub fn new(endpoint: &str, table: &str, api_key: Option<String>, timeout: Duration) -> Self {
        let mut client = Postgrest::new(endpoint.trim_end_matches('/'));
        if let Some(key) = &api_key {
            client = client.insert_header("apikey", key.as_str());
        }
        Self {
            client,
            table: table.to_string(),
            api_key,
            timeout,
        }
    }
}

#[async_trait]
impl ServiceAreaStore for HttpServiceAreaStore {
    async fn service_area(&self, vendor_id: &str) -> Result<Option<ServiceArea>> {
        let mut request = self.client.from(&self.table);
        if let Some(key) = &self.api_key {
            request = request.auth(key);
        }
        let request = request
            .eq("id", vendor_id)
            .select("delivery_mode,latitude,longitude,radius_km,colonia_keys");

        let rows: Vec<VendorRow> = fetch_rows(request, self.timeout).await.map_err(|message| {
            EligibilityError::ServiceAreaUnavailable {
                vendor_id: vendor_id.to_string(),
                message,
            }
        })?;

        Ok(rows
            .into_iter()
            .next()
            .map(|row| row.into_service_area(vendor_id)))
    }
}
