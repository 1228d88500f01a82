use crate::domain::model::Coordinate;

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle (haversine) distance in kilometres.
///
/// Performs no validation; out-of-range inputs are rejected upstream.
pub fn distance_km(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    // abs() 讓 a→b 與 b→a 的結果逐位元相同
    let dlat = (b.latitude - a.latitude).abs().to_radians();
    let dlon = (b.longitude - a.longitude).abs().to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    // 對蹠點附近捨入誤差可能讓 h 略大於 1
    let h = h.clamp(0.0, 1.0);

    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Rounds to 2 decimals for display.
pub fn round_km(km: f64) -> f64 {
    (km * 100.0).round() / 100.0
}
