//! Crop records and the bulk insert used during farm creation

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::AppResult;

/// Crop type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum CropType {
    Corn,
    Soybeans,
    Coffee,
    Rice,
    Beans,
}

impl CropType {
    pub const ALL: [CropType; 5] = [
        CropType::Corn,
        CropType::Soybeans,
        CropType::Coffee,
        CropType::Rice,
        CropType::Beans,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CropType::Corn => "CORN",
            CropType::Soybeans => "SOYBEANS",
            CropType::Coffee => "COFFEE",
            CropType::Rice => "RICE",
            CropType::Beans => "BEANS",
        }
    }
}

impl FromStr for CropType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CropType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or(())
    }
}

/// Crop record
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Crop {
    pub id: Uuid,
    pub farm_id: Uuid,
    #[serde(rename = "type")]
    pub crop_type: CropType,
    pub is_irrigated: bool,
    pub is_insured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw crop sub-record from a farm creation request. The type arrives as a
/// string and is validated against [`CropType`] before anything is persisted.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCropInput {
    #[serde(rename = "type", default)]
    pub crop_type: String,
    #[serde(default)]
    pub is_irrigated: bool,
    #[serde(default)]
    pub is_insured: bool,
}

/// A crop sub-record that passed validation
#[derive(Debug, Clone)]
pub struct NewCrop {
    pub crop_type: CropType,
    pub is_irrigated: bool,
    pub is_insured: bool,
}

/// Crop service for persisting crops scoped to a farm
#[derive(Clone)]
pub struct CropService {
    db: PgPool,
}

impl CropService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Bulk insert crop rows tagged with the owning farm id
    pub async fn create_many(&self, farm_id: Uuid, crops: &[NewCrop]) -> AppResult<()> {
        if crops.is_empty() {
            return Ok(());
        }

        let mut builder = QueryBuilder::<Postgres>::new(
            "INSERT INTO crops (farm_id, crop_type, is_irrigated, is_insured) ",
        );
        builder.push_values(crops, |mut row, crop| {
            row.push_bind(farm_id)
                .push_bind(crop.crop_type)
                .push_bind(crop.is_irrigated)
                .push_bind(crop.is_insured);
        });
        builder.build().execute(&self.db).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crop_type_parses_all_known_values() {
        for (raw, expected) in [
            ("CORN", CropType::Corn),
            ("SOYBEANS", CropType::Soybeans),
            ("COFFEE", CropType::Coffee),
            ("RICE", CropType::Rice),
            ("BEANS", CropType::Beans),
        ] {
            assert_eq!(raw.parse::<CropType>(), Ok(expected));
        }
    }

    #[test]
    fn crop_type_rejects_unknown_and_lowercase() {
        assert!("WHEAT".parse::<CropType>().is_err());
        assert!("corn".parse::<CropType>().is_err());
        assert!("".parse::<CropType>().is_err());
    }

    #[test]
    fn crop_type_as_str_round_trips() {
        for crop_type in CropType::ALL {
            assert_eq!(crop_type.as_str().parse::<CropType>(), Ok(crop_type));
        }
    }

    #[test]
    fn crop_serializes_with_wire_field_names() {
        let crop = Crop {
            id: Uuid::nil(),
            farm_id: Uuid::nil(),
            crop_type: CropType::Coffee,
            is_irrigated: true,
            is_insured: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let value = serde_json::to_value(&crop).unwrap();
        assert_eq!(value["type"], "COFFEE");
        assert_eq!(value["isIrrigated"], true);
        assert_eq!(value["isInsured"], false);
        assert!(value.get("farmId").is_some());
    }

    #[test]
    fn create_crop_input_defaults_missing_fields() {
        let input: CreateCropInput = serde_json::from_str("{}").unwrap();
        assert_eq!(input.crop_type, "");
        assert!(!input.is_irrigated);
        assert!(!input.is_insured);
    }
}
