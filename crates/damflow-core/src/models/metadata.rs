use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MetadataFieldType {
    #[default]
    Text,
    Number,
    Date,
    Select,
    Boolean,
}

impl Display for MetadataFieldType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            MetadataFieldType::Text => write!(f, "text"),
            MetadataFieldType::Number => write!(f, "number"),
            MetadataFieldType::Date => write!(f, "date"),
            MetadataFieldType::Select => write!(f, "select"),
            MetadataFieldType::Boolean => write!(f, "boolean"),
        }
    }
}

impl FromStr for MetadataFieldType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(MetadataFieldType::Text),
            "number" => Ok(MetadataFieldType::Number),
            "date" => Ok(MetadataFieldType::Date),
            "select" => Ok(MetadataFieldType::Select),
            "boolean" => Ok(MetadataFieldType::Boolean),
            _ => Err(anyhow::anyhow!("Invalid metadata field type: {}", s)),
        }
    }
}

/// Named, typed attribute definable once and attachable to many assets.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MetadataField {
    pub id: i64,
    pub name: String,
    pub field_type: MetadataFieldType,
    /// Encoded option list for `select` fields
    pub options: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[cfg(feature = "sqlx")]
impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for MetadataField {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(MetadataField {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            field_type: row
                .try_get::<String, _>("field_type")?
                .parse()
                .map_err(|e| {
                    sqlx::Error::Decode(format!("Failed to parse field_type: {}", e).into())
                })?,
            options: row.try_get("options")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Value of one field on one asset.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AssetMetadataEntry {
    pub asset_id: Uuid,
    pub field_id: i64,
    pub field_name: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

#[cfg(feature = "sqlx")]
impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for AssetMetadataEntry {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(AssetMetadataEntry {
            asset_id: row.try_get("asset_id")?,
            field_id: row.try_get("field_id")?,
            field_name: row.try_get("field_name")?,
            value: row.try_get("value")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Value addressed by field name; the field is created on first use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataPair {
    pub name: String,
    pub value: String,
}

impl MetadataPair {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Value addressed by an existing field id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MetadataValue {
    #[serde(alias = "fieldId")]
    pub field_id: i64,
    pub value: String,
}
