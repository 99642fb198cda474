//! Farm service: validation, creation orchestration, and the joined
//! list/filter query
//!
//! Farm creation is a two-phase write: the farm row is inserted first, then
//! the crop rows are bulk inserted with the new farm id. There is no rollback
//! when the second phase fails; the caller gets the created id together with
//! a warning so the partial state is observable.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::crop::{CreateCropInput, Crop, CropService, CropType, NewCrop};

const FARM_COLUMNS: &str =
    "id, name, address, land_area, unit_of_measurement, created_at, updated_at";

/// Farm record
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Farm {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub land_area: i64,
    pub unit_of_measurement: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Farm with its joined crops, as returned by every read endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmWithCrops {
    #[serde(flatten)]
    pub farm: Farm,
    pub crops: Vec<Crop>,
}

/// Input for creating a farm. Fields default to their zero values so that
/// missing fields surface as a validation error rather than a decode error.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFarmInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub land_area: i64,
    #[serde(default)]
    pub unit_of_measurement: String,
    #[serde(default)]
    pub crops: Vec<CreateCropInput>,
}

/// Patch for updating a farm. Absent fields are left untouched; a field that
/// is present but empty (or a non-positive land area) is rejected.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFarmInput {
    pub name: Option<String>,
    pub address: Option<String>,
    pub land_area: Option<i64>,
    pub unit_of_measurement: Option<String>,
}

/// Query parameters for listing farms
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFarmsQuery {
    pub skip: i64,
    pub limit: i64,
    pub land_area: Option<i64>,
    pub crop_type: Option<String>,
}

/// Response body for a successful creation. `warning` is set when the farm
/// row persisted but its crops could not be.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedFarm {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Farm service for CRUD and the joined listing query
#[derive(Clone)]
pub struct FarmService {
    db: PgPool,
    crops: CropService,
}

impl FarmService {
    pub fn new(db: PgPool) -> Self {
        let crops = CropService::new(db.clone());
        Self { db, crops }
    }

    /// Create a farm and, when present, its crop sub-records
    pub async fn create_farm(&self, input: CreateFarmInput) -> AppResult<CreatedFarm> {
        let crops = validate_new_farm(&input)?;

        let farm_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO farms (name, address, land_area, unit_of_measurement)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(&input.name)
        .bind(&input.address)
        .bind(input.land_area)
        .bind(&input.unit_of_measurement)
        .fetch_one(&self.db)
        .await
        .map_err(map_farm_write_error)?;

        if crops.is_empty() {
            return Ok(CreatedFarm {
                id: farm_id,
                warning: None,
            });
        }

        // Second phase of the two-phase write. The farm row is kept on
        // failure and the partial state is reported to the caller.
        let warning = match self.crops.create_many(farm_id, &crops).await {
            Ok(()) => None,
            Err(err) => {
                tracing::error!(%farm_id, "Failed to bulk persist crops: {:?}", err);
                Some("farm was created but its crops could not be persisted".to_string())
            }
        };

        Ok(CreatedFarm {
            id: farm_id,
            warning,
        })
    }

    /// List farms with their crops, newest first
    ///
    /// The crop type filter keeps farms having at least one crop of that
    /// type; the land area filter keeps farms at or above the bound. Both
    /// are ANDed when present. The returned crop list is the farm's full
    /// crop set, not a filtered sub-list.
    pub async fn list_farms(&self, query: ListFarmsQuery) -> AppResult<Vec<FarmWithCrops>> {
        if query.skip < 0 {
            return Err(AppError::Validation {
                field: "skip".to_string(),
                message: "skip must be zero or positive".to_string(),
            });
        }
        if query.limit <= 0 {
            return Err(AppError::Validation {
                field: "limit".to_string(),
                message: "limit must be positive".to_string(),
            });
        }

        let crop_type = query
            .crop_type
            .as_deref()
            .map(|raw| {
                raw.parse::<CropType>().map_err(|_| AppError::Validation {
                    field: "cropType".to_string(),
                    message: format!("'{}' is not a valid crop type", raw),
                })
            })
            .transpose()?;

        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM farms f WHERE TRUE",
            FARM_COLUMNS
        ));
        if let Some(crop_type) = crop_type {
            builder.push(" AND EXISTS (SELECT 1 FROM crops c WHERE c.farm_id = f.id AND c.crop_type = ");
            builder.push_bind(crop_type);
            builder.push(")");
        }
        if let Some(land_area) = query.land_area {
            builder.push(" AND f.land_area >= ");
            builder.push_bind(land_area);
        }
        // Newest first; this ordering keeps pagination deterministic.
        builder.push(" ORDER BY f.created_at DESC OFFSET ");
        builder.push_bind(query.skip);
        builder.push(" LIMIT ");
        builder.push_bind(query.limit);

        let farms: Vec<Farm> = builder.build_query_as().fetch_all(&self.db).await?;
        if farms.is_empty() {
            return Ok(Vec::new());
        }

        let farm_ids: Vec<Uuid> = farms.iter().map(|farm| farm.id).collect();
        let crops = sqlx::query_as::<_, Crop>(
            r#"
            SELECT id, farm_id, crop_type, is_irrigated, is_insured, created_at, updated_at
            FROM crops
            WHERE farm_id = ANY($1)
            ORDER BY created_at ASC
            "#,
        )
        .bind(&farm_ids)
        .fetch_all(&self.db)
        .await?;

        let mut crops_by_farm: HashMap<Uuid, Vec<Crop>> = HashMap::new();
        for crop in crops {
            crops_by_farm.entry(crop.farm_id).or_default().push(crop);
        }

        Ok(farms
            .into_iter()
            .map(|farm| {
                let crops = crops_by_farm.remove(&farm.id).unwrap_or_default();
                FarmWithCrops { farm, crops }
            })
            .collect())
    }

    /// Get a farm by id with its crops
    pub async fn get_farm(&self, id: &str) -> AppResult<FarmWithCrops> {
        let farm_id = parse_farm_id(id)?;

        let farm = sqlx::query_as::<_, Farm>(&format!(
            "SELECT {} FROM farms WHERE id = $1",
            FARM_COLUMNS
        ))
        .bind(farm_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Farm".to_string()))?;

        let crops = sqlx::query_as::<_, Crop>(
            r#"
            SELECT id, farm_id, crop_type, is_irrigated, is_insured, created_at, updated_at
            FROM crops
            WHERE farm_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(farm_id)
        .fetch_all(&self.db)
        .await?;

        Ok(FarmWithCrops { farm, crops })
    }

    /// Apply a sparse patch to a farm
    pub async fn update_farm(&self, id: &str, input: UpdateFarmInput) -> AppResult<FarmWithCrops> {
        let farm_id = parse_farm_id(id)?;
        validate_patch(&input)?;

        let result = sqlx::query(
            r#"
            UPDATE farms
            SET name = COALESCE($2, name),
                address = COALESCE($3, address),
                land_area = COALESCE($4, land_area),
                unit_of_measurement = COALESCE($5, unit_of_measurement),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(farm_id)
        .bind(&input.name)
        .bind(&input.address)
        .bind(input.land_area)
        .bind(&input.unit_of_measurement)
        .execute(&self.db)
        .await
        .map_err(map_farm_write_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Farm".to_string()));
        }

        self.get_farm(id).await
    }

    /// Delete a farm by id. Crops are intentionally left behind.
    pub async fn delete_farm(&self, id: &str) -> AppResult<()> {
        let farm_id = parse_farm_id(id)?;

        let result = sqlx::query("DELETE FROM farms WHERE id = $1")
            .bind(farm_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Farm".to_string()));
        }

        Ok(())
    }
}

fn parse_farm_id(id: &str) -> AppResult<Uuid> {
    Uuid::parse_str(id).map_err(|_| AppError::InvalidIdentifier(id.to_string()))
}

/// A farm name unique-index violation means the farm already exists.
fn map_farm_write_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::AlreadyExists("farm name".to_string())
        }
        _ => AppError::Database(err),
    }
}

/// Validate a farm creation request and parse its crop sub-records. Stops at
/// the first invalid crop.
fn validate_new_farm(input: &CreateFarmInput) -> AppResult<Vec<NewCrop>> {
    if input.name.trim().is_empty() {
        return Err(required_field("name"));
    }
    if input.land_area <= 0 {
        return Err(AppError::Validation {
            field: "landArea".to_string(),
            message: "land area is required and must be positive".to_string(),
        });
    }
    if input.unit_of_measurement.trim().is_empty() {
        return Err(required_field("unitOfMeasurement"));
    }
    if input.address.trim().is_empty() {
        return Err(required_field("address"));
    }

    let mut crops = Vec::with_capacity(input.crops.len());
    for crop in &input.crops {
        let crop_type = crop
            .crop_type
            .parse::<CropType>()
            .map_err(|_| AppError::Validation {
                field: "crops.type".to_string(),
                message: format!("'{}' is not a valid crop type", crop.crop_type),
            })?;
        crops.push(NewCrop {
            crop_type,
            is_irrigated: crop.is_irrigated,
            is_insured: crop.is_insured,
        });
    }

    Ok(crops)
}

fn validate_patch(input: &UpdateFarmInput) -> AppResult<()> {
    if matches!(&input.name, Some(name) if name.trim().is_empty()) {
        return Err(present_but_empty("name"));
    }
    if matches!(&input.address, Some(address) if address.trim().is_empty()) {
        return Err(present_but_empty("address"));
    }
    if matches!(&input.unit_of_measurement, Some(unit) if unit.trim().is_empty()) {
        return Err(present_but_empty("unitOfMeasurement"));
    }
    if matches!(input.land_area, Some(area) if area <= 0) {
        return Err(AppError::Validation {
            field: "landArea".to_string(),
            message: "land area must be positive".to_string(),
        });
    }
    Ok(())
}

fn required_field(field: &str) -> AppError {
    AppError::Validation {
        field: field.to_string(),
        message: format!("{} is required", field),
    }
}

fn present_but_empty(field: &str) -> AppError {
    AppError::Validation {
        field: field.to_string(),
        message: format!("{} cannot be empty", field),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_input() -> CreateFarmInput {
        CreateFarmInput {
            name: "Farm 1".to_string(),
            address: "Rua 1, 123, Porto Alegre - RS".to_string(),
            land_area: 87,
            unit_of_measurement: "hectares".to_string(),
            crops: Vec::new(),
        }
    }

    fn crop(crop_type: &str) -> CreateCropInput {
        CreateCropInput {
            crop_type: crop_type.to_string(),
            is_irrigated: false,
            is_insured: false,
        }
    }

    fn rejected_field(err: AppError) -> String {
        match err {
            AppError::Validation { field, .. } => field,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn valid_farm_without_crops_passes() {
        assert!(validate_new_farm(&valid_input()).unwrap().is_empty());
    }

    #[test]
    fn valid_farm_with_crops_parses_them() {
        let mut input = valid_input();
        input.crops = vec![crop("CORN"), crop("SOYBEANS")];
        let crops = validate_new_farm(&input).unwrap();
        assert_eq!(crops.len(), 2);
        assert_eq!(crops[0].crop_type, CropType::Corn);
        assert_eq!(crops[1].crop_type, CropType::Soybeans);
    }

    #[test]
    fn missing_name_is_rejected() {
        let mut input = valid_input();
        input.name = "  ".to_string();
        assert_eq!(rejected_field(validate_new_farm(&input).unwrap_err()), "name");
    }

    #[test]
    fn missing_land_area_is_rejected() {
        let mut input = valid_input();
        input.land_area = 0;
        assert_eq!(
            rejected_field(validate_new_farm(&input).unwrap_err()),
            "landArea"
        );
    }

    #[test]
    fn missing_unit_of_measurement_is_rejected() {
        let mut input = valid_input();
        input.unit_of_measurement = String::new();
        assert_eq!(
            rejected_field(validate_new_farm(&input).unwrap_err()),
            "unitOfMeasurement"
        );
    }

    #[test]
    fn missing_address_is_rejected() {
        let mut input = valid_input();
        input.address = String::new();
        assert_eq!(
            rejected_field(validate_new_farm(&input).unwrap_err()),
            "address"
        );
    }

    #[test]
    fn invalid_crop_type_short_circuits() {
        let mut input = valid_input();
        input.crops = vec![crop("CORN"), crop("WHEAT"), crop("BANANA")];
        let err = validate_new_farm(&input).unwrap_err();
        assert_eq!(rejected_field(err), "crops.type");
    }

    #[test]
    fn empty_crop_type_is_rejected() {
        let mut input = valid_input();
        input.crops = vec![crop("")];
        assert!(validate_new_farm(&input).is_err());
    }

    #[test]
    fn parse_farm_id_rejects_malformed_ids() {
        assert!(matches!(
            parse_farm_id("not-a-uuid"),
            Err(AppError::InvalidIdentifier(_))
        ));
        assert!(parse_farm_id("8d8ac610-566d-4ef0-9c22-186b2a5ed793").is_ok());
    }

    #[test]
    fn patch_with_only_name_is_valid() {
        let input = UpdateFarmInput {
            name: Some("X".to_string()),
            address: None,
            land_area: None,
            unit_of_measurement: None,
        };
        assert!(validate_patch(&input).is_ok());
    }

    #[test]
    fn patch_rejects_present_but_empty_fields() {
        let input = UpdateFarmInput {
            name: Some(String::new()),
            address: None,
            land_area: None,
            unit_of_measurement: None,
        };
        assert!(validate_patch(&input).is_err());
    }

    #[test]
    fn patch_rejects_non_positive_land_area() {
        let input = UpdateFarmInput {
            name: None,
            address: None,
            land_area: Some(0),
            unit_of_measurement: None,
        };
        assert!(validate_patch(&input).is_err());
    }

    #[test]
    fn create_input_defaults_missing_fields_to_zero_values() {
        let input: CreateFarmInput = serde_json::from_str(r#"{"name": "Farm 1"}"#).unwrap();
        assert_eq!(input.name, "Farm 1");
        assert_eq!(input.land_area, 0);
        assert!(input.crops.is_empty());
        assert!(validate_new_farm(&input).is_err());
    }

    #[test]
    fn update_input_distinguishes_absent_from_present() {
        let input: UpdateFarmInput = serde_json::from_str(r#"{"name": "X"}"#).unwrap();
        assert_eq!(input.name.as_deref(), Some("X"));
        assert!(input.address.is_none());
        assert!(input.land_area.is_none());
        assert!(input.unit_of_measurement.is_none());
    }

    #[test]
    fn created_farm_omits_warning_when_none() {
        let body = serde_json::to_value(CreatedFarm {
            id: Uuid::nil(),
            warning: None,
        })
        .unwrap();
        assert!(body.get("warning").is_none());

        let body = serde_json::to_value(CreatedFarm {
            id: Uuid::nil(),
            warning: Some("farm was created but its crops could not be persisted".to_string()),
        })
        .unwrap();
        assert!(body.get("warning").is_some());
    }

    #[test]
    fn farm_with_crops_serializes_flat_with_camel_case() {
        let farm = FarmWithCrops {
            farm: Farm {
                id: Uuid::nil(),
                name: "Farm 1".to_string(),
                address: "Rua 1".to_string(),
                land_area: 87,
                unit_of_measurement: "hectares".to_string(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            crops: Vec::new(),
        };
        let value = serde_json::to_value(&farm).unwrap();
        assert_eq!(value["landArea"], 87);
        assert_eq!(value["unitOfMeasurement"], "hectares");
        assert!(value.get("crops").is_some());
        assert!(value.get("createdAt").is_some());
    }
}
