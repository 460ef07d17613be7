// src/models/pricing.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::driver::VehicleType;
use crate::models::ride::GeoPoint;
use crate::utils::geo;

/// Temporary geofenced multiplier. Held in process memory only; not
/// persisted across restarts.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SurgeArea {
    pub id: String,
    pub name: String,
    pub center: GeoPoint,
    pub radius_km: f64,
    pub multiplier: f64,
    pub expires_at: DateTime<Utc>,
}

impl SurgeArea {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    /// Point-in-circle test against the pickup location.
    pub fn contains(&self, point: &GeoPoint) -> bool {
        geo::haversine_km(
            self.center.latitude,
            self.center.longitude,
            point.latitude,
            point.longitude,
        ) <= self.radius_km
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiscountType {
    Percentage {
        percent: f64,
        // Cap on the absolute discount, if any
        max_discount: Option<f64>,
    },
    Fixed {
        amount: f64,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PromoOffer {
    pub id: String,
    pub name: String,
    pub discount: DiscountType,
    pub min_distance_km: Option<f64>,
    // Empty means all vehicle types are eligible
    pub vehicle_types: Vec<VehicleType>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub usage_count: u64,
    pub usage_limit: Option<u64>,
}

impl PromoOffer {
    /// Eligibility check; the usage counter itself is only touched under the
    /// promotion store's write lock.
    pub fn is_applicable(
        &self,
        now: DateTime<Utc>,
        distance_km: f64,
        vehicle_type: VehicleType,
    ) -> bool {
        if now < self.valid_from || now > self.valid_until {
            return false;
        }
        if let Some(limit) = self.usage_limit {
            if self.usage_count >= limit {
                return false;
            }
        }
        if let Some(min) = self.min_distance_km {
            if distance_km < min {
                return false;
            }
        }
        self.vehicle_types.is_empty() || self.vehicle_types.contains(&vehicle_type)
    }

    /// Discount amount against a running fare, never more than the fare itself.
    pub fn discount_amount(&self, fare: f64) -> f64 {
        let raw = match &self.discount {
            DiscountType::Percentage { percent, max_discount } => {
                let amount = fare * percent / 100.0;
                match max_discount {
                    Some(cap) => amount.min(*cap),
                    None => amount,
                }
            }
            DiscountType::Fixed { amount } => *amount,
        };
        raw.min(fare)
    }
}

/// Full multiplier breakdown for auditability. Reproducible byte-for-byte
/// given the same area/offer state, timestamp and weather source.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FareBreakdown {
    pub base_fare: f64,
    pub distance_fare: f64,
    pub time_fare: f64,
    pub surge_multiplier: f64,
    pub demand_multiplier: f64,
    pub weather_multiplier: f64,
    pub time_of_day_multiplier: f64,
    pub discount: f64,
    pub total: f64,
    pub currency: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SurgeInfo {
    pub name: String,
    pub multiplier: f64,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FareEstimate {
    pub fare: f64,
    pub distance_km: f64,
    pub duration_secs: f64,
    pub breakdown: FareBreakdown,
    pub applied_promotions: Vec<String>,
    pub surge_info: Option<SurgeInfo>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EstimateFareRequest {
    pub pickup: GeoPoint,
    pub dropoff: GeoPoint,
    pub vehicle_type: VehicleType,
    pub rider_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterSurgeAreaRequest {
    pub name: String,
    pub center: GeoPoint,
    pub radius_km: f64,
    pub multiplier: f64,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterPromoRequest {
    pub name: String,
    pub discount: DiscountType,
    pub min_distance_km: Option<f64>,
    pub vehicle_types: Vec<VehicleType>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub usage_limit: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn offer(discount: DiscountType) -> PromoOffer {
        PromoOffer {
            id: "pro-260101-abc123".to_string(),
            name: "test".to_string(),
            discount,
            min_distance_km: None,
            vehicle_types: vec![],
            valid_from: Utc::now() - Duration::hours(1),
            valid_until: Utc::now() + Duration::hours(1),
            usage_count: 0,
            usage_limit: None,
        }
    }

    #[test]
    fn percentage_discount_respects_cap() {
        let o = offer(DiscountType::Percentage {
            percent: 50.0,
            max_discount: Some(3.0),
        });
        assert!((o.discount_amount(100.0) - 3.0).abs() < 1e-9);
        assert!((o.discount_amount(4.0) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn fixed_discount_never_exceeds_fare() {
        let o = offer(DiscountType::Fixed { amount: 10.0 });
        assert!((o.discount_amount(6.0) - 6.0).abs() < 1e-9);
    }

    #[test]
    fn exhausted_offer_is_not_applicable() {
        let mut o = offer(DiscountType::Fixed { amount: 1.0 });
        o.usage_limit = Some(2);
        o.usage_count = 2;
        assert!(!o.is_applicable(Utc::now(), 5.0, VehicleType::Regular));
    }

    #[test]
    fn surge_area_point_in_circle() {
        let area = SurgeArea {
            id: "srg-260101-abc123".to_string(),
            name: "downtown".to_string(),
            center: GeoPoint { latitude: 40.7128, longitude: -74.0060 },
            radius_km: 2.0,
            multiplier: 1.5,
            expires_at: Utc::now() + Duration::hours(1),
        };
        assert!(area.contains(&GeoPoint { latitude: 40.7128, longitude: -74.0060 }));
        assert!(!area.contains(&GeoPoint { latitude: 40.7589, longitude: -73.9851 }));
    }
}
