use async_trait::async_trait;
use damflow_core::constants::metadata_fields;
use damflow_core::models::{
    Asset, AssetMetadataEntry, AssetSearch, AssetSearchPage, AssetStatus, AssetTypeFilter,
    MetadataField, MetadataFieldType, MetadataPair, MetadataValue, NewAsset,
};
use damflow_core::AppError;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::store::AssetStore;

const ASSET_COLUMNS: &str = r#"
    id, filename, original_filename, stored_filename, file_type, file_size, path,
    thumbnail, storage_tier, keywords, status, owner_user_id, group_id,
    created_at, updated_at
"#;

/// Shared WHERE clause of the search queries. Binds: $1 user, $2 groups, $3 name pattern,
/// $4 MIME prefix pattern, $5 documents only, $6 from, $7 to, $8 keyword patterns.
const SEARCH_FILTER: &str = r#"
    status = 'active'
    AND (owner_user_id = $1 OR group_id = ANY($2))
    AND ($3::text IS NULL OR filename ILIKE $3)
    AND ($4::text IS NULL OR file_type ILIKE $4)
    AND (NOT $5::boolean OR NOT (
        file_type ILIKE 'image/%' OR file_type ILIKE 'video/%' OR file_type ILIKE 'audio/%'
    ))
    AND ($6::timestamptz IS NULL OR updated_at >= $6)
    AND ($7::timestamptz IS NULL OR updated_at <= $7)
    AND (cardinality($8::text[]) = 0
        OR EXISTS (SELECT 1 FROM unnest(keywords) AS k WHERE k ILIKE ANY($8)))
"#;

/// Asset and metadata persistence.
#[derive(Clone)]
pub struct AssetRepository {
    pool: PgPool,
}

impl AssetRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Locks the asset row for the rest of the transaction.
    async fn lock_asset(
        tx: &mut Transaction<'_, Postgres>,
        asset_id: Uuid,
    ) -> Result<(), AppError> {
        let found: Option<Uuid> =
            sqlx::query_scalar::<Postgres, Uuid>("SELECT id FROM assets WHERE id = $1 FOR UPDATE")
                .bind(asset_id)
                .fetch_optional(&mut **tx)
                .await?;

        match found {
            Some(_) => Ok(()),
            None => Err(AppError::NotFound(format!("Asset {} not found", asset_id))),
        }
    }

    /// Returns the id of the named field, creating it as a text field when missing.
    /// The unique name constraint settles concurrent creation.
    async fn ensure_field(
        tx: &mut Transaction<'_, Postgres>,
        name: &str,
    ) -> Result<i64, AppError> {
        sqlx::query(
            r#"
            INSERT INTO metadata_fields (name, field_type)
            VALUES ($1, $2)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(name)
        .bind(MetadataFieldType::Text.to_string())
        .execute(&mut **tx)
        .await?;

        let id = sqlx::query_scalar::<Postgres, i64>("SELECT id FROM metadata_fields WHERE name = $1")
            .bind(name)
            .fetch_one(&mut **tx)
            .await?;
        Ok(id)
    }

    async fn upsert_value(
        tx: &mut Transaction<'_, Postgres>,
        asset_id: Uuid,
        field_id: i64,
        value: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO asset_metadata (asset_id, field_id, value, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (asset_id, field_id)
            DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
            "#,
        )
        .bind(asset_id)
        .bind(field_id)
        .bind(value)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Inserts or overwrites the asset row as `active`.
    async fn insert_asset(conn: &mut PgConnection, asset: &NewAsset) -> Result<Asset, AppError> {
        let sql = format!(
            r#"
            INSERT INTO assets (
                id, filename, original_filename, stored_filename, file_type, file_size,
                path, thumbnail, storage_tier, keywords, status, owner_user_id, group_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (id) DO UPDATE SET
                filename = EXCLUDED.filename,
                original_filename = EXCLUDED.original_filename,
                stored_filename = EXCLUDED.stored_filename,
                file_type = EXCLUDED.file_type,
                file_size = EXCLUDED.file_size,
                path = EXCLUDED.path,
                thumbnail = EXCLUDED.thumbnail,
                storage_tier = EXCLUDED.storage_tier,
                keywords = EXCLUDED.keywords,
                status = EXCLUDED.status,
                updated_at = NOW()
            RETURNING {}
            "#,
            ASSET_COLUMNS
        );

        let created = sqlx::query_as::<Postgres, Asset>(&sql)
            .bind(asset.id)
            .bind(&asset.filename)
            .bind(&asset.original_filename)
            .bind(&asset.stored_filename)
            .bind(&asset.file_type)
            .bind(asset.file_size)
            .bind(&asset.path)
            .bind(&asset.thumbnail)
            .bind(asset.storage_tier.to_string())
            .bind(&asset.keywords)
            .bind(AssetStatus::Active.to_string())
            .bind(asset.owner_user_id)
            .bind(asset.group_id)
            .fetch_one(&mut *conn)
            .await?;
        Ok(created)
    }

    /// Writes non-empty pairs by field name. Returns the title the asset was renamed to,
    /// if any.
    async fn write_pairs(
        tx: &mut Transaction<'_, Postgres>,
        asset_id: Uuid,
        pairs: &[MetadataPair],
    ) -> Result<Option<String>, AppError> {
        let mut title = None;
        for pair in pairs {
            let value = pair.value.trim();
            if value.is_empty() {
                continue;
            }
            let field_id = Self::ensure_field(tx, &pair.name).await?;
            Self::upsert_value(tx, asset_id, field_id, value).await?;

            if pair.name == metadata_fields::TITLE {
                Self::rename_asset(tx, asset_id, value).await?;
                title = Some(value.to_string());
            }
        }
        Ok(title)
    }

    async fn rename_asset(
        tx: &mut Transaction<'_, Postgres>,
        asset_id: Uuid,
        title: &str,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE assets SET filename = $2, updated_at = NOW() WHERE id = $1")
            .bind(asset_id)
            .bind(title)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl AssetStore for AssetRepository {
    #[tracing::instrument(
        skip(self, asset),
        fields(db.table = "assets", db.operation = "upsert", asset.id = %asset.id)
    )]
    async fn create_asset(&self, asset: NewAsset) -> Result<Asset, AppError> {
        let mut conn = self.pool.acquire().await?;
        let created = Self::insert_asset(&mut conn, &asset).await?;
        tracing::info!(
            asset.id = %created.id,
            tier = %created.storage_tier,
            file_type = %created.file_type,
            "Asset stored"
        );
        Ok(created)
    }

    #[tracing::instrument(
        skip(self, asset, pairs),
        fields(db.table = "assets", db.operation = "upsert", asset.id = %asset.id, pairs = pairs.len())
    )]
    async fn create_asset_with_metadata(
        &self,
        asset: NewAsset,
        pairs: &[MetadataPair],
    ) -> Result<Asset, AppError> {
        let mut tx = self.pool.begin().await?;
        let mut created = Self::insert_asset(&mut tx, &asset).await?;
        if let Some(title) = Self::write_pairs(&mut tx, created.id, pairs).await? {
            created.filename = title;
        }
        tx.commit().await?;

        tracing::info!(
            asset.id = %created.id,
            tier = %created.storage_tier,
            file_type = %created.file_type,
            "Asset stored with metadata"
        );
        Ok(created)
    }

    #[tracing::instrument(skip(self), fields(db.table = "assets", db.operation = "select"))]
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Asset>, AppError> {
        let sql = format!("SELECT {} FROM assets WHERE id = $1", ASSET_COLUMNS);
        let asset = sqlx::query_as::<Postgres, Asset>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(asset)
    }

    #[tracing::instrument(skip(self), fields(db.table = "assets", db.operation = "select"))]
    async fn find_all_accessible(
        &self,
        user_id: i64,
        group_ids: &[i64],
    ) -> Result<Vec<Asset>, AppError> {
        let sql = format!(
            r#"
            SELECT {}
            FROM assets
            WHERE status = 'active'
                AND (owner_user_id = $1 OR group_id = ANY($2))
            ORDER BY created_at DESC
            "#,
            ASSET_COLUMNS
        );
        let assets = sqlx::query_as::<Postgres, Asset>(&sql)
            .bind(user_id)
            .bind(group_ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(assets)
    }

    #[tracing::instrument(
        skip(self, search),
        fields(
            db.table = "assets",
            db.operation = "search",
            page = search.page,
            limit = search.limit
        )
    )]
    async fn search(
        &self,
        user_id: i64,
        group_ids: &[i64],
        search: &AssetSearch,
    ) -> Result<AssetSearchPage, AppError> {
        let name_pattern = search.name_pattern();
        let type_pattern = search.file_type.mime_prefix().map(|p| format!("{}%", p));
        let documents_only = search.file_type == AssetTypeFilter::Document;
        let keyword_patterns = search.keyword_patterns();

        let mut tx = self.pool.begin().await?;

        let count_sql = format!("SELECT COUNT(*) FROM assets WHERE {}", SEARCH_FILTER);
        let total: i64 = sqlx::query_scalar::<Postgres, i64>(&count_sql)
            .bind(user_id)
            .bind(group_ids)
            .bind(name_pattern.as_deref())
            .bind(type_pattern.as_deref())
            .bind(documents_only)
            .bind(search.from_date)
            .bind(search.to_date)
            .bind(&keyword_patterns)
            .fetch_one(&mut *tx)
            .await?;

        // Sort column and direction come from closed enums.
        let page_sql = format!(
            "SELECT {} FROM assets WHERE {} ORDER BY {} {dir}, id {dir} LIMIT $9 OFFSET $10",
            ASSET_COLUMNS,
            SEARCH_FILTER,
            search.sort_by.column(),
            dir = search.order.keyword(),
        );
        let data = sqlx::query_as::<Postgres, Asset>(&page_sql)
            .bind(user_id)
            .bind(group_ids)
            .bind(name_pattern.as_deref())
            .bind(type_pattern.as_deref())
            .bind(documents_only)
            .bind(search.from_date)
            .bind(search.to_date)
            .bind(&keyword_patterns)
            .bind(i64::from(search.limit))
            .bind(search.offset())
            .fetch_all(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(AssetSearchPage::new(data, total, search))
    }

    #[tracing::instrument(
        skip(self, pairs),
        fields(db.table = "asset_metadata", db.operation = "upsert", pairs = pairs.len())
    )]
    async fn upsert_metadata(
        &self,
        asset_id: Uuid,
        pairs: &[MetadataPair],
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        Self::lock_asset(&mut tx, asset_id).await?;
        Self::write_pairs(&mut tx, asset_id, pairs).await?;
        tx.commit().await?;
        Ok(())
    }

    #[tracing::instrument(
        skip(self, values),
        fields(db.table = "asset_metadata", db.operation = "upsert", values = values.len())
    )]
    async fn save_metadata_values(
        &self,
        asset_id: Uuid,
        values: &[MetadataValue],
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        Self::lock_asset(&mut tx, asset_id).await?;

        for entry in values {
            let name: Option<String> = sqlx::query_scalar::<Postgres, String>(
                "SELECT name FROM metadata_fields WHERE id = $1",
            )
            .bind(entry.field_id)
            .fetch_optional(&mut *tx)
            .await?;

            let Some(name) = name else {
                return Err(AppError::NotFound(format!(
                    "Metadata field {} not found",
                    entry.field_id
                )));
            };

            let value = entry.value.trim();
            if value.is_empty() {
                continue;
            }
            Self::upsert_value(&mut tx, asset_id, entry.field_id, value).await?;

            if name == metadata_fields::TITLE {
                Self::rename_asset(&mut tx, asset_id, value).await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "asset_metadata", db.operation = "select"))]
    async fn list_metadata(&self, asset_id: Uuid) -> Result<Vec<AssetMetadataEntry>, AppError> {
        let entries = sqlx::query_as::<Postgres, AssetMetadataEntry>(
            r#"
            SELECT am.asset_id, am.field_id, mf.name AS field_name, am.value, am.updated_at
            FROM asset_metadata am
            JOIN metadata_fields mf ON mf.id = am.field_id
            WHERE am.asset_id = $1
            ORDER BY mf.name
            "#,
        )
        .bind(asset_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    #[tracing::instrument(skip(self), fields(db.table = "metadata_fields", db.operation = "select"))]
    async fn list_metadata_fields(&self) -> Result<Vec<MetadataField>, AppError> {
        let fields = sqlx::query_as::<Postgres, MetadataField>(
            "SELECT id, name, field_type, options, created_at FROM metadata_fields ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(fields)
    }

    #[tracing::instrument(skip(self), fields(db.table = "assets", db.operation = "update"))]
    async fn soft_delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE assets
            SET status = 'deleted', updated_at = NOW()
            WHERE id = $1 AND status = 'active'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            tracing::info!(asset.id = %id, "Asset soft-deleted");
        }
        Ok(deleted)
    }
}
