// src/utils/id_generator.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdType {
    Rider,
    Driver,
    Ride,
    Vehicle,
    Promotion,
    SurgeArea,
}

impl IdType {
    pub fn to_prefix(&self) -> &'static str {
        match self {
            IdType::Rider => "usr",
            IdType::Driver => "drv",
            IdType::Ride => "rid",
            IdType::Vehicle => "veh",
            IdType::Promotion => "pro",
            IdType::SurgeArea => "srg",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "usr" => Some(IdType::Rider),
            "drv" => Some(IdType::Driver),
            "rid" => Some(IdType::Ride),
            "veh" => Some(IdType::Vehicle),
            "pro" => Some(IdType::Promotion),
            "srg" => Some(IdType::SurgeArea),
            _ => None,
        }
    }
}

impl fmt::Display for IdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_prefix())
    }
}

pub struct IdGenerator;

impl IdGenerator {
    /// Generate a unique ID with format: {prefix}-{yymmdd}-{random_suffix}
    pub fn generate(id_type: IdType) -> String {
        Self::generate_with_timestamp(id_type, Utc::now())
    }

    /// Generate ID with a specific timestamp (useful for testing)
    pub fn generate_with_timestamp(id_type: IdType, timestamp: DateTime<Utc>) -> String {
        let date_part = timestamp.format("%y%m%d").to_string();
        format!("{}-{}-{}", id_type.to_prefix(), date_part, Self::random_suffix(6))
    }

    fn random_suffix(n: usize) -> String {
        use rand::Rng;
        const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

        let mut rng = rand::rng();
        (0..n)
            .map(|_| {
                let idx = rng.random_range(0..CHARSET.len());
                CHARSET[idx] as char
            })
            .collect()
    }

    /// Parse an ID into its components, or None if the shape is wrong.
    pub fn parse_id(id: &str) -> Option<ParsedId> {
        let parts: Vec<&str> = id.split('-').collect();
        if parts.len() != 3 {
            return None;
        }

        let id_type = IdType::from_prefix(parts[0])?;
        let date_part = parts[1];
        let suffix = parts[2];

        if date_part.len() != 6 || suffix.len() != 6 {
            return None;
        }

        let year = format!("20{}", &date_part[0..2]).parse::<i32>().ok()?;
        let month = date_part[2..4].parse::<u32>().ok()?;
        let day = date_part[4..6].parse::<u32>().ok()?;
        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            return None;
        }

        Some(ParsedId {
            id_type,
            year,
            month,
            day,
            suffix: suffix.to_string(),
        })
    }

    /// Validate that an ID is well formed and, if given, of the expected type.
    pub fn validate_id(id: &str, expected_type: Option<IdType>) -> bool {
        match Self::parse_id(id) {
            Some(parsed) => expected_type.map_or(true, |expected| parsed.id_type == expected),
            None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedId {
    pub id_type: IdType,
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub suffix: String,
}
