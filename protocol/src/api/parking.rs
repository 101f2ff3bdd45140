//! Parking API DTOs
//!
//! Types for the sensor-backed spot listing, reservation management,
//! availability queries and blocker control.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// A parking spot as reported by GET /api/sensor/
///
/// The four latitude/longitude pairs are the corners of the spot polygon as
/// drawn on the map; the flags mirror the physical sensor and blocker state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParkingSpot {
    /// Stable spot identifier used in reservation and availability calls
    pub reference: String,
    pub name: String,
    pub is_lock: bool,
    pub is_occupied: bool,
    pub is_blocker_raised: bool,
    pub latitude1: f64,
    pub latitude2: f64,
    pub latitude3: f64,
    pub latitude4: f64,
    pub longitude1: f64,
    pub longitude2: f64,
    pub longitude3: f64,
    pub longitude4: f64,
}

impl ParkingSpot {
    /// A spot is bookable when it is neither locked out nor occupied
    pub fn is_free(&self) -> bool {
        !self.is_lock && !self.is_occupied
    }
}

/// Reservation creation request for POST /api/parking/reservations/
///
/// Times are local-timezone `YYYY-MM-DDTHH:MM` strings; the backend owns
/// all pricing and conflict checks.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewReservation {
    #[validate(length(min = 1))]
    pub parking_spot: String,
    #[validate(length(min = 16, max = 16))]
    pub start_time: String,
    #[validate(length(min = 16, max = 16))]
    pub end_time: String,
}

/// A reservation as returned by the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: i64,
    pub parking_spot: String,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub total_price: Option<f64>,
    #[serde(default)]
    pub spot_name: Option<String>,
}

/// One bookable hour window from the availability query
///
/// GET /api/parking/parking-spot/{reference}/available-windows/?date=...
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableWindow {
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl AvailableWindow {
    pub fn is_blocked(&self) -> bool {
        self.status.as_deref() == Some("blocked")
    }
}

/// Blocker control request for POST /api/blocker/raise/ and /api/blocker/lower/
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockerRequest {
    pub parking_spot: String,
}

/// Blocker control acknowledgement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockerResponse {
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spot_free_only_when_unlocked_and_vacant() {
        let mut spot: ParkingSpot = serde_json::from_str(
            r#"{
                "reference":"A-01","name":"Spot A-01",
                "is_lock":false,"is_occupied":false,"is_blocker_raised":false,
                "latitude1":43.23,"latitude2":43.23,"latitude3":43.23,"latitude4":43.23,
                "longitude1":76.9,"longitude2":76.9,"longitude3":76.9,"longitude4":76.9
            }"#,
        )
        .unwrap();
        assert!(spot.is_free());
        spot.is_occupied = true;
        assert!(!spot.is_free());
        spot.is_occupied = false;
        spot.is_lock = true;
        assert!(!spot.is_free());
    }

    #[test]
    fn blocked_window_detection() {
        let window = AvailableWindow {
            start_time: "2025-06-01T10:00".into(),
            end_time: "2025-06-01T11:00".into(),
            status: Some("blocked".into()),
            reason: Some("reserved".into()),
        };
        assert!(window.is_blocked());
    }
}
