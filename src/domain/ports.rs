use crate::domain::model::{ColoniaKey, Coordinate, ServiceArea, ZipCode, ZipCodeRecord};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Read-only postal reference data. A zip code can map to several colonias.
#[async_trait]
pub trait ZipCodeDirectory: Send + Sync {
    async fn find_by_zip(&self, zip: &ZipCode) -> Result<Vec<ZipCodeRecord>>;

    async fn find_by_colonia_key(&self, key: &ColoniaKey) -> Result<Option<ZipCodeRecord>>;

    /// Approximate coordinate of a zip code: the mean of its colonia centroids.
    async fn locate(&self, zip: &ZipCode) -> Result<Option<Coordinate>> {
        let records = self.find_by_zip(zip).await?;
        Ok(ZipCodeRecord::mean_centroid(&records))
    }
}

/// Source of each vendor's current delivery configuration.
#[async_trait]
pub trait ServiceAreaStore: Send + Sync {
    /// `Ok(None)` when the vendor never configured delivery.
    async fn service_area(&self, vendor_id: &str) -> Result<Option<ServiceArea>>;
}
