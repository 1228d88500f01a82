use crate::core::colonia_key::{self, normalize_colonia_name, DecodedAllowlist};
use crate::core::geo::{distance_km, round_km};
use crate::domain::model::{
    Coordinate, Destination, EligibilityDecision, ReasonCode, ServiceArea, ZipCode, ZipCodeRecord,
};
use std::collections::BTreeSet;

/// Directory data prefetched by the caller so evaluation stays free of I/O.
#[derive(Debug, Clone, Default)]
pub struct DirectoryView {
    /// Every directory record for the destination zip code.
    pub destination_records: Vec<ZipCodeRecord>,
    /// Records of the allow-listed colonias that the directory knows about.
    pub allowlist_records: Vec<ZipCodeRecord>,
}

impl DirectoryView {
    fn allowlist_record(&self, zip: &ZipCode, slug: &str) -> Option<&ZipCodeRecord> {
        self.allowlist_records
            .iter()
            .find(|r| &r.zip_code == zip && normalize_colonia_name(&r.colonia) == slug)
    }
}

/// Decides whether a service area covers a destination. Pure and stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct EligibilityEvaluator;

impl EligibilityEvaluator {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(
        &self,
        service_area: &ServiceArea,
        destination: &Destination,
        view: &DirectoryView,
    ) -> EligibilityDecision {
        let decision = match service_area {
            ServiceArea::Unconfigured => EligibilityDecision::rejected(
                ReasonCode::NoServiceAreaConfigured,
                "This vendor has not set up delivery zones yet.",
            ),
            ServiceArea::Radius { center, radius_km } => {
                self.evaluate_radius(*center, *radius_km, destination)
            }
            ServiceArea::Allowlist { colonia_keys } => {
                self.evaluate_allowlist(colonia_keys, destination, view)
            }
        };

        tracing::debug!(
            "Evaluated {} service area: deliverable={}, reason={}",
            service_area.mode_name(),
            decision.deliverable,
            decision.reason_code
        );
        decision
    }

    fn evaluate_radius(
        &self,
        center: Coordinate,
        radius_km: f64,
        destination: &Destination,
    ) -> EligibilityDecision {
        if !center.is_valid() || !radius_km.is_finite() || radius_km <= 0.0 {
            return EligibilityDecision::rejected(
                ReasonCode::InvalidServiceArea,
                "This vendor's delivery radius is misconfigured.",
            );
        }

        let Some(point) = destination.coordinate() else {
            return EligibilityDecision::rejected(
                ReasonCode::MissingDestinationCoordinate,
                "We need the exact location of your address to check delivery for this vendor.",
            );
        };

        // 以未四捨五入的距離比較，邊界值 (d == radius) 視為可配送
        let distance = distance_km(center, point);
        let deliverable = distance <= radius_km;
        let (reason_code, message) = if deliverable {
            (
                ReasonCode::WithinRadius,
                format!(
                    "Your address is {:.2} km away, within the {:.2} km delivery radius.",
                    distance, radius_km
                ),
            )
        } else {
            (
                ReasonCode::OutsideRadius,
                format!(
                    "Your address is {:.2} km away; this vendor only delivers within {:.2} km.",
                    distance, radius_km
                ),
            )
        };

        EligibilityDecision {
            deliverable,
            distance_km: Some(round_km(distance)),
            service_radius_km: Some(round_km(radius_km)),
            reason_code,
            message,
        }
    }

    fn evaluate_allowlist(
        &self,
        raw_keys: &[String],
        destination: &Destination,
        view: &DirectoryView,
    ) -> EligibilityDecision {
        let allowlist = colonia_key::decode_all(raw_keys);
        if allowlist.keys.is_empty() {
            return EligibilityDecision::rejected(
                ReasonCode::InvalidServiceArea,
                "This vendor's delivery zones are misconfigured.",
            );
        }

        let Some(zip) = destination.zip_code() else {
            return EligibilityDecision::rejected(
                ReasonCode::MissingDestinationZipCode,
                "Enter your postal code to check delivery for this vendor.",
            );
        };

        if !allowlist.zip_codes().contains(zip) {
            return outside_allowlist(&allowlist, view);
        }

        if let Some(colonia) = destination.colonia() {
            return if allowlist.contains(zip, colonia) {
                within_allowlist(colonia, zip)
            } else {
                outside_allowlist(&allowlist, view)
            };
        }

        // 只有郵遞區號時，目錄必須確認該區號的每個 colonia 都在清單內；
        // 目錄查無資料也不能放行
        let mut known = view
            .destination_records
            .iter()
            .filter(|r| &r.zip_code == zip)
            .peekable();
        let fully_covered =
            known.peek().is_some() && known.all(|r| allowlist.contains(zip, &r.colonia));
        if fully_covered {
            let label = allowlist
                .keys_for_zip(zip)
                .map(|k| display_name(view, zip, &k.colonia_name))
                .collect::<Vec<_>>()
                .join(", ");
            return within_allowlist(&label, zip);
        }

        let choices: Vec<String> = allowlist
            .keys_for_zip(zip)
            .map(|k| display_name(view, zip, &k.colonia_name))
            .collect();
        EligibilityDecision::rejected(
            ReasonCode::ColoniaRequired,
            format!(
                "This vendor delivers in postal code {} only to: {}. Please select your colonia.",
                zip,
                choices.join(", ")
            ),
        )
    }
}

fn display_name(view: &DirectoryView, zip: &ZipCode, slug: &str) -> String {
    view.allowlist_record(zip, slug)
        .or_else(|| {
            view.destination_records
                .iter()
                .find(|r| &r.zip_code == zip && normalize_colonia_name(&r.colonia) == slug)
        })
        .map(|r| r.colonia.clone())
        .unwrap_or_else(|| slug.to_string())
}

fn within_allowlist(colonia: &str, zip: &ZipCode) -> EligibilityDecision {
    EligibilityDecision {
        deliverable: true,
        distance_km: None,
        service_radius_km: None,
        reason_code: ReasonCode::WithinAllowlist,
        message: format!("This vendor delivers to {} ({}).", colonia, zip),
    }
}

fn outside_allowlist(allowlist: &DecodedAllowlist, view: &DirectoryView) -> EligibilityDecision {
    let municipalities: BTreeSet<&str> = allowlist
        .keys
        .iter()
        .filter_map(|k| view.allowlist_record(&k.zip_code, &k.colonia_name))
        .map(|r| r.municipality.as_str())
        .collect();

    let message = if municipalities.is_empty() {
        let zips: BTreeSet<&str> = allowlist.keys.iter().map(|k| k.zip_code.as_str()).collect();
        format!(
            "This vendor does not deliver to your colonia. \
             Delivery is available in postal codes: {}.",
            zips.into_iter().collect::<Vec<_>>().join(", ")
        )
    } else {
        format!(
            "This vendor does not deliver to your colonia. Delivery is available in: {}.",
            municipalities.into_iter().collect::<Vec<_>>().join(", ")
        )
    };

    EligibilityDecision::rejected(ReasonCode::OutsideAllowlist, message)
}
