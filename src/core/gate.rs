use crate::core::colonia_key;
use crate::core::evaluator::{DirectoryView, EligibilityEvaluator};
use crate::domain::model::{ColoniaKey, Destination, EligibilityDecision, ServiceArea, ZipCode};
use crate::domain::ports::{ServiceAreaStore, ZipCodeDirectory};
use crate::utils::error::Result;
use serde::Serialize;

/// Checks run before a cart mutation or an order placement.
///
/// Nothing is cached: every call re-reads the vendor's service area and the
/// directory, since either may have changed since the previous call.
pub struct CartAdmissionGate<S: ServiceAreaStore, D: ZipCodeDirectory> {
    store: S,
    directory: D,
    evaluator: EligibilityEvaluator,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorDecision {
    pub vendor_id: String,
    pub decision: EligibilityDecision,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutAdmission {
    pub decisions: Vec<VendorDecision>,
}

impl CheckoutAdmission {
    pub fn is_admitted(&self) -> bool {
        self.decisions.iter().all(|d| d.decision.deliverable)
    }

    pub fn blocked(&self) -> impl Iterator<Item = &VendorDecision> {
        self.decisions.iter().filter(|d| !d.decision.deliverable)
    }
}

impl<S: ServiceAreaStore, D: ZipCodeDirectory> CartAdmissionGate<S, D> {
    pub fn new(store: S, directory: D) -> Self {
        Self {
            store,
            directory,
            evaluator: EligibilityEvaluator::new(),
        }
    }

    /// Decision for adding one of `vendor_id`'s items to the cart.
    /// The mutation must be blocked unless `deliverable` is true.
    pub async fn can_add_item(
        &self,
        vendor_id: &str,
        destination: &Destination,
    ) -> Result<EligibilityDecision> {
        let service_area = self.store.service_area(vendor_id).await?.unwrap_or_default();
        tracing::debug!(
            "Vendor {} uses {} service area",
            vendor_id,
            service_area.mode_name()
        );

        let (destination, view) = self.prepare(&service_area, destination).await?;
        let decision = self.evaluator.evaluate(&service_area, &destination, &view);

        if !decision.deliverable {
            tracing::info!(
                "🚫 Vendor {} cannot deliver: {} ({})",
                vendor_id,
                decision.reason_code,
                decision.message
            );
        }
        Ok(decision)
    }

    /// Read-only preview for the storefront "check delivery" surface.
    pub async fn check_delivery(
        &self,
        vendor_id: &str,
        destination: &Destination,
    ) -> Result<EligibilityDecision> {
        tracing::debug!("Previewing delivery for vendor {}", vendor_id);
        self.can_add_item(vendor_id, destination).await
    }

    /// Evaluates every vendor in the cart before an order is placed.
    pub async fn check_checkout<V: AsRef<str>>(
        &self,
        vendor_ids: &[V],
        destination: &Destination,
    ) -> Result<CheckoutAdmission> {
        let mut decisions: Vec<VendorDecision> = Vec::with_capacity(vendor_ids.len());

        for vendor_id in vendor_ids {
            let vendor_id = vendor_id.as_ref();
            if decisions.iter().any(|d| d.vendor_id == vendor_id) {
                continue;
            }
            let decision = self.can_add_item(vendor_id, destination).await?;
            decisions.push(VendorDecision {
                vendor_id: vendor_id.to_string(),
                decision,
            });
        }

        let admission = CheckoutAdmission { decisions };
        tracing::info!(
            "Checkout check: {} vendor(s), {} blocked",
            admission.decisions.len(),
            admission.blocked().count()
        );
        Ok(admission)
    }

    /// Fetches what the evaluator needs for the vendor's mode.
    async fn prepare(
        &self,
        service_area: &ServiceArea,
        destination: &Destination,
    ) -> Result<(Destination, DirectoryView)> {
        let mut view = DirectoryView::default();

        match service_area {
            ServiceArea::Unconfigured => {}
            ServiceArea::Radius { .. } => {
                if destination.coordinate().is_none() {
                    if let Some(zip) = destination.zip_code() {
                        if let Some(coordinate) = self.directory.locate(zip).await? {
                            tracing::debug!(
                                "Resolved zip {} to ({:.4}, {:.4})",
                                zip,
                                coordinate.latitude,
                                coordinate.longitude
                            );
                            return Ok((destination.clone().with_coordinate(coordinate), view));
                        }
                    }
                }
            }
            ServiceArea::Allowlist { colonia_keys } => {
                if let Some(zip) = destination.zip_code() {
                    view.destination_records = self.directory.find_by_zip(zip).await?;
                }

                // 格式錯誤的項目由評估器記錄，這裡直接略過
                let keys: Vec<ColoniaKey> = colonia_keys
                    .iter()
                    .filter_map(|k| colonia_key::decode(k).ok())
                    .collect();
                let mut zips: Vec<&ZipCode> = Vec::new();
                for key in &keys {
                    if !zips.contains(&&key.zip_code) {
                        zips.push(&key.zip_code);
                    }
                }

                // 每個郵遞區號只查一次，目的地的區號沿用上面的結果
                for zip in zips {
                    let records = if destination.zip_code() == Some(zip) {
                        view.destination_records.clone()
                    } else {
                        self.directory.find_by_zip(zip).await?
                    };
                    view.allowlist_records.extend(records.into_iter().filter(|r| {
                        let slug = colonia_key::normalize_colonia_name(&r.colonia);
                        keys.iter().any(|k| &k.zip_code == zip && k.colonia_name == slug)
                    }));
                }
            }
        }

        Ok((destination.clone(), view))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Coordinate, ReasonCode, ZipCodeRecord};
    use crate::utils::error::EligibilityError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone, Default)]
    struct MockStore {
        areas: Arc<Mutex<HashMap<String, ServiceArea>>>,
        reads: Arc<AtomicUsize>,
    }

    impl MockStore {
        async fn set(&self, vendor_id: &str, area: ServiceArea) {
            self.areas.lock().await.insert(vendor_id.to_string(), area);
        }
    }

    #[async_trait]
    impl ServiceAreaStore for MockStore {
        async fn service_area(&self, vendor_id: &str) -> Result<Option<ServiceArea>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(self.areas.lock().await.get(vendor_id).cloned())
        }
    }

    struct MockDirectory {
        records: Vec<ZipCodeRecord>,
        available: bool,
        lookups: Arc<AtomicUsize>,
    }

    impl MockDirectory {
        fn new(records: Vec<ZipCodeRecord>) -> Self {
            Self {
                records,
                available: true,
                lookups: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn down() -> Self {
            Self {
                available: false,
                ..Self::new(vec![])
            }
        }
    }

    #[async_trait]
    impl ZipCodeDirectory for MockDirectory {
        async fn find_by_zip(&self, zip: &ZipCode) -> Result<Vec<ZipCodeRecord>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if !self.available {
                return Err(EligibilityError::directory_unavailable("connection refused"));
            }
            Ok(self
                .records
                .iter()
                .filter(|r| &r.zip_code == zip)
                .cloned()
                .collect())
        }

        async fn find_by_colonia_key(&self, key: &ColoniaKey) -> Result<Option<ZipCodeRecord>> {
            Ok(self.find_by_zip(&key.zip_code).await?.into_iter().find(|r| {
                colonia_key::normalize_colonia_name(&r.colonia) == key.colonia_name
            }))
        }
    }

    fn zip(z: &str) -> ZipCode {
        ZipCode::parse(z).unwrap()
    }

    fn record(
        z: &str,
        colonia: &str,
        municipality: &str,
        centroid: Option<(f64, f64)>,
    ) -> ZipCodeRecord {
        ZipCodeRecord {
            zip_code: zip(z),
            colonia: colonia.to_string(),
            municipality: municipality.to_string(),
            state: "Ciudad de México".to_string(),
            city: None,
            centroid: centroid.map(|(lat, lng)| Coordinate::new_unchecked(lat, lng)),
        }
    }

    fn directory() -> MockDirectory {
        MockDirectory::new(vec![
            record("11510", "Polanco", "Miguel Hidalgo", Some((19.4326, -99.1950))),
            record("06000", "Centro", "Cuauhtémoc", Some((19.4326, -99.1332))),
            record("04000", "Villa Coyoacán", "Coyoacán", Some((19.3500, -99.1620))),
            record("04000", "Santa Catarina", "Coyoacán", Some((19.3460, -99.1700))),
        ])
    }

    fn radius_area() -> ServiceArea {
        ServiceArea::Radius {
            center: Coordinate::new_unchecked(19.3327, -99.1882),
            radius_km: 10.0,
        }
    }

    #[tokio::test]
    async fn test_unknown_vendor_is_unconfigured() {
        let gate = CartAdmissionGate::new(MockStore::default(), directory());
        let decision = gate
            .can_add_item("v-404", &Destination::postal(zip("11510")))
            .await
            .unwrap();
        assert!(!decision.deliverable);
        assert_eq!(decision.reason_code, ReasonCode::NoServiceAreaConfigured);
    }

    #[tokio::test]
    async fn test_radius_resolves_coordinate_from_zip() {
        let store = MockStore::default();
        store.set("v-1", radius_area()).await;
        let gate = CartAdmissionGate::new(store, directory());

        let decision = gate
            .can_add_item("v-1", &Destination::postal(zip("04000")))
            .await
            .unwrap();
        assert!(decision.deliverable);
        assert_eq!(decision.reason_code, ReasonCode::WithinRadius);

        let decision = gate
            .can_add_item("v-1", &Destination::postal(zip("06000")))
            .await
            .unwrap();
        assert_eq!(decision.reason_code, ReasonCode::OutsideRadius);
    }

    #[tokio::test]
    async fn test_radius_unresolvable_zip_needs_coordinate() {
        let store = MockStore::default();
        store.set("v-1", radius_area()).await;
        let gate = CartAdmissionGate::new(store, directory());

        let decision = gate
            .can_add_item("v-1", &Destination::postal(zip("99999")))
            .await
            .unwrap();
        assert_eq!(decision.reason_code, ReasonCode::MissingDestinationCoordinate);
        assert!(decision.needs_more_input());
    }

    #[tokio::test]
    async fn test_allowlist_uses_directory_municipalities() {
        let store = MockStore::default();
        store
            .set(
                "v-2",
                ServiceArea::Allowlist {
                    colonia_keys: vec![
                        "polanco-11510".to_string(),
                        "villa-coyoacan-04000".to_string(),
                    ],
                },
            )
            .await;
        let gate = CartAdmissionGate::new(store, directory());

        let decision = gate
            .can_add_item("v-2", &Destination::postal(zip("06000")))
            .await
            .unwrap();
        assert_eq!(decision.reason_code, ReasonCode::OutsideAllowlist);
        assert!(decision.message.contains("Coyoacán, Miguel Hidalgo"));

        // 04000 同時涵蓋 Santa Catarina，未指定 colonia 時須要求使用者選擇
        let decision = gate
            .can_add_item("v-2", &Destination::postal(zip("04000")))
            .await
            .unwrap();
        assert_eq!(decision.reason_code, ReasonCode::ColoniaRequired);

        let decision = gate
            .can_add_item(
                "v-2",
                &Destination::postal_with_colonia(zip("04000"), "Villa Coyoacán"),
            )
            .await
            .unwrap();
        assert!(decision.deliverable);
    }

    #[tokio::test]
    async fn test_allowlist_fetches_each_zip_once() {
        let store = MockStore::default();
        store
            .set(
                "v-2",
                ServiceArea::Allowlist {
                    colonia_keys: vec![
                        "villa-coyoacan-04000".to_string(),
                        "santa-catarina-04000".to_string(),
                        "polanco-11510".to_string(),
                        "granada-11510".to_string(),
                        "centro-06000".to_string(),
                    ],
                },
            )
            .await;
        let directory = directory();
        let lookups = directory.lookups.clone();
        let gate = CartAdmissionGate::new(store, directory);

        // 04000 與目的地相同，只需再查 11510 與 06000
        let decision = gate
            .can_add_item("v-2", &Destination::postal(zip("04000")))
            .await
            .unwrap();
        assert!(decision.deliverable);
        assert_eq!(lookups.load(Ordering::SeqCst), 3);

        // 目的地不在清單內的區號
        lookups.store(0, Ordering::SeqCst);
        let decision = gate
            .can_add_item("v-2", &Destination::postal(zip("03020")))
            .await
            .unwrap();
        assert_eq!(decision.reason_code, ReasonCode::OutsideAllowlist);
        assert!(decision.message.contains("Coyoacán, Cuauhtémoc, Miguel Hidalgo"));
        assert_eq!(lookups.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_directory_failure_is_an_error_not_a_rejection() {
        let store = MockStore::default();
        store
            .set(
                "v-2",
                ServiceArea::Allowlist {
                    colonia_keys: vec!["polanco-11510".to_string()],
                },
            )
            .await;
        let gate = CartAdmissionGate::new(store, MockDirectory::down());

        let err = gate
            .can_add_item("v-2", &Destination::postal(zip("11510")))
            .await
            .unwrap_err();
        assert!(matches!(err, EligibilityError::DirectoryUnavailable { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_service_area_changes_are_seen_immediately() {
        let store = MockStore::default();
        let gate = CartAdmissionGate::new(store.clone(), directory());
        let dest = Destination::Point(Coordinate::new_unchecked(19.3500, -99.1620));

        let before = gate.can_add_item("v-3", &dest).await.unwrap();
        assert_eq!(before.reason_code, ReasonCode::NoServiceAreaConfigured);

        store.set("v-3", radius_area()).await;
        let after = gate.can_add_item("v-3", &dest).await.unwrap();
        assert!(after.deliverable);
        assert_eq!(store.reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_checkout_blocks_on_any_vendor() {
        let store = MockStore::default();
        store.set("v-1", radius_area()).await;
        store
            .set(
                "v-2",
                ServiceArea::Allowlist {
                    colonia_keys: vec!["polanco-11510".to_string()],
                },
            )
            .await;
        let gate = CartAdmissionGate::new(store.clone(), directory());
        let dest = Destination::Address {
            zip_code: zip("04000"),
            colonia: Some("Villa Coyoacán".to_string()),
            coordinate: Coordinate::new_unchecked(19.3500, -99.1620),
        };

        let admission = gate
            .check_checkout(["v-1", "v-2", "v-1"].as_slice(), &dest)
            .await
            .unwrap();
        assert_eq!(admission.decisions.len(), 2);
        assert!(!admission.is_admitted());
        let blocked: Vec<&str> = admission.blocked().map(|d| d.vendor_id.as_str()).collect();
        assert_eq!(blocked, vec!["v-2"]);
        assert_eq!(store.reads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_check_delivery_preview_matches_add_item() {
        tokio_test::block_on(async {
            let store = MockStore::default();
            store.set("v-1", radius_area()).await;
            let gate = CartAdmissionGate::new(store, directory());
            let dest = Destination::Point(Coordinate::new_unchecked(19.4326, -99.1332));

            let preview = gate.check_delivery("v-1", &dest).await.unwrap();
            let add = gate.can_add_item("v-1", &dest).await.unwrap();
            assert_eq!(preview, add);
            assert!(!preview.deliverable);
        });
    }
}
