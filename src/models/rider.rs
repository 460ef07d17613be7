// src/models/rider.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentPreference {
    Card,
    Cash,
    Wallet,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Rider {
    pub id: String,
    pub user_id: String, // Reference to the account service
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub payment_preference: PaymentPreference,
    pub rating: f32,
    pub rating_count: u32,
    // Invariant: at most one active ride at a time
    pub current_ride_id: Option<String>,
    // Append-only; completed and cancelled ride ids, oldest first
    pub ride_history: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Rider {
    pub fn apply_rating(&mut self, rating: u8) {
        let total = self.rating * self.rating_count as f32 + rating as f32;
        self.rating_count += 1;
        self.rating = total / self.rating_count as f32;
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RiderRegistration {
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub payment_preference: PaymentPreference,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RiderResponse {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub payment_preference: PaymentPreference,
    pub rating: f32,
    pub current_ride_id: Option<String>,
}

impl From<Rider> for RiderResponse {
    fn from(rider: Rider) -> Self {
        RiderResponse {
            id: rider.id,
            first_name: rider.first_name,
            last_name: rider.last_name,
            payment_preference: rider.payment_preference,
            rating: rider.rating,
            current_ride_id: rider.current_ride_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rider_response_hides_account_fields() {
        let rider = Rider {
            id: "rdr-260101-abc123".to_string(),
            user_id: "user-42".to_string(),
            first_name: "Ama".to_string(),
            last_name: "Mensah".to_string(),
            phone_number: "+233201234567".to_string(),
            payment_preference: PaymentPreference::Wallet,
            rating: 4.8,
            rating_count: 12,
            current_ride_id: None,
            ride_history: vec![],
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_value(RiderResponse::from(rider)).unwrap();
        assert_eq!(json["id"], "rdr-260101-abc123");
        assert_eq!(json["payment_preference"], "wallet");
        assert!(json.get("user_id").is_none());
        assert!(json.get("phone_number").is_none());
        assert!(json.get("is_active").is_none());
    }
}
