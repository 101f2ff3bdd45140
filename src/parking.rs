//! Parking operations: spots, availability, reservations, blocker control

use chrono::NaiveDate;
use reqwest::Method;
use validator::Validate;

use parq_protocol::{
    AvailableWindow, BlockerRequest, BlockerResponse, NewReservation, ParkingSpot, Reservation,
};

use crate::client::ApiClient;
use crate::error::Result;

/// Parking service
pub struct ParkingService {
    client: ApiClient,
}

impl ParkingService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// All parking spots with their live sensor state
    pub async fn spots(&self) -> Result<Vec<ParkingSpot>> {
        self.client
            .request(Method::GET, "/sensor/", None::<&()>)
            .await
    }

    /// Bookable hour windows for a spot on a given date
    pub async fn available_windows(
        &self,
        reference: &str,
        date: NaiveDate,
    ) -> Result<Vec<AvailableWindow>> {
        let endpoint = format!(
            "/parking/parking-spot/{}/available-windows/?date={}",
            reference,
            date.format("%Y-%m-%d")
        );
        self.client
            .request(Method::GET, &endpoint, None::<&()>)
            .await
    }

    /// Create a reservation; the backend computes the price
    pub async fn reserve(&self, reservation: NewReservation) -> Result<Reservation> {
        reservation.validate()?;
        self.client
            .request(Method::POST, "/parking/reservations/", Some(&reservation))
            .await
    }

    /// The caller's reservations
    pub async fn reservations(&self) -> Result<Vec<Reservation>> {
        self.client
            .request(Method::GET, "/parking/reservations/", None::<&()>)
            .await
    }

    /// Cancel a reservation
    pub async fn cancel(&self, id: i64) -> Result<()> {
        let endpoint = format!("/parking/reservations/{}/cancel/", id);
        let _: serde_json::Value = self
            .client
            .request(Method::POST, &endpoint, None::<&()>)
            .await?;
        Ok(())
    }

    /// Raise the physical blocker on a reserved spot
    pub async fn raise_blocker(&self, reference: &str) -> Result<BlockerResponse> {
        let request = BlockerRequest {
            parking_spot: reference.to_string(),
        };
        self.client
            .request(Method::POST, "/blocker/raise/", Some(&request))
            .await
    }

    /// Lower the physical blocker on a reserved spot
    pub async fn lower_blocker(&self, reference: &str) -> Result<BlockerResponse> {
        let request = BlockerRequest {
            parking_spot: reference.to_string(),
        };
        self.client
            .request(Method::POST, "/blocker/lower/", Some(&request))
            .await
    }
}
