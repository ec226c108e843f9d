use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{ActorId, CatalogItemId, CorrelationId, DeliveryId, MovementId, RoomId};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Bucket, CatalogItem, ExtraDelivery, MovementKind, MovementOrigin, MovementQuery,
    MovementRecord, Result, Room, RoomLinenRequirement, RoomStatus, RoomType, StockCounters,
    StoreError,
    store::{
        AppliedCommit, Commit, MovementStream, ReferenceStore, StockStore, apply_records,
        paged_stream, validate_commit,
    },
};

/// Page size used when streaming the movement log.
const STREAM_PAGE_SIZE: usize = 500;

/// Advisory lock key serializing appends to the movement log.
const LOG_APPEND_LOCK: i64 = 0x6c69_6e65_6e5f_6c6f;

const MOVEMENT_COLUMNS: &str = "id, catalog_item_id, movement_type, origin, from_status, to_status, quantity, room_id, created_by, correlation_id, notes, created_at";

const DELIVERY_COLUMNS: &str = "id, room_id, catalog_item_id, quantity, reason, delivered_by, correlation_id, delivered_at, reconciled_by";

/// PostgreSQL-backed stock and reference store.
#[derive(Clone)]
pub struct PostgresStockStore {
    pool: PgPool,
}

impl PostgresStockStore {
    /// Creates a new PostgreSQL stock store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Inserts or updates a catalog item.
    pub async fn upsert_item(&self, item: &CatalogItem) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO catalog_items (id, name, unit, icon)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                unit = EXCLUDED.unit,
                icon = EXCLUDED.icon,
                updated_at = NOW()
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(&item.name)
        .bind(&item.unit)
        .bind(&item.icon)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Inserts or updates a room.
    pub async fn upsert_room(&self, room: &Room) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO rooms (id, name, room_type, capacity, status)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                room_type = EXCLUDED.room_type,
                capacity = EXCLUDED.capacity,
                status = EXCLUDED.status,
                updated_at = NOW()
            "#,
        )
        .bind(room.id.as_uuid())
        .bind(&room.name)
        .bind(room.room_type.as_str())
        .bind(i64::from(room.capacity))
        .bind(room.status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Sets the base requirement of an item for a room. A zero quantity
    /// removes the requirement.
    pub async fn set_requirement(
        &self,
        room_id: RoomId,
        catalog_item_id: CatalogItemId,
        quantity: u32,
    ) -> Result<()> {
        if quantity == 0 {
            sqlx::query("DELETE FROM room_linen_config WHERE room_id = $1 AND catalog_item_id = $2")
                .bind(room_id.as_uuid())
                .bind(catalog_item_id.as_uuid())
                .execute(&self.pool)
                .await?;
            return Ok(());
        }

        sqlx::query(
            r#"
            INSERT INTO room_linen_config (room_id, catalog_item_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (room_id, catalog_item_id) DO UPDATE SET quantity = EXCLUDED.quantity
            "#,
        )
        .bind(room_id.as_uuid())
        .bind(catalog_item_id.as_uuid())
        .bind(i64::from(quantity))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn row_to_counters(row: PgRow) -> Result<StockCounters> {
        Ok(StockCounters {
            catalog_item_id: CatalogItemId::from_uuid(row.try_get::<Uuid, _>("catalog_item_id")?),
            total: to_count(row.try_get("total_stock")?, "total_stock")?,
            available: to_count(row.try_get("available_stock")?, "available_stock")?,
            in_use: to_count(row.try_get("in_use_stock")?, "in_use_stock")?,
            dirty: to_count(row.try_get("dirty_stock")?, "dirty_stock")?,
            updated_at: row.try_get::<Option<DateTime<Utc>>, _>("updated_at")?,
        })
    }

    fn row_to_movement(row: PgRow) -> Result<MovementRecord> {
        let kind: String = row.try_get("movement_type")?;
        let origin: String = row.try_get("origin")?;
        let from: Option<String> = row.try_get("from_status")?;
        let to: Option<String> = row.try_get("to_status")?;

        Ok(MovementRecord {
            id: MovementId::from_uuid(row.try_get::<Uuid, _>("id")?),
            catalog_item_id: CatalogItemId::from_uuid(row.try_get::<Uuid, _>("catalog_item_id")?),
            kind: MovementKind::parse(&kind)
                .ok_or_else(|| StoreError::CorruptRow(format!("unknown movement type {kind}")))?,
            from: from.as_deref().map(parse_bucket).transpose()?,
            to: to.as_deref().map(parse_bucket).transpose()?,
            quantity: to_count(row.try_get("quantity")?, "quantity")?,
            origin: MovementOrigin::parse(&origin)
                .ok_or_else(|| StoreError::CorruptRow(format!("unknown origin {origin}")))?,
            timestamp: row.try_get("created_at")?,
            actor_id: row
                .try_get::<Option<Uuid>, _>("created_by")?
                .map(ActorId::from_uuid),
            room_id: row
                .try_get::<Option<Uuid>, _>("room_id")?
                .map(RoomId::from_uuid),
            correlation_id: CorrelationId::from_uuid(row.try_get::<Uuid, _>("correlation_id")?),
            notes: row.try_get("notes")?,
        })
    }

    fn row_to_delivery(row: PgRow) -> Result<ExtraDelivery> {
        Ok(ExtraDelivery {
            id: DeliveryId::from_uuid(row.try_get::<Uuid, _>("id")?),
            room_id: RoomId::from_uuid(row.try_get::<Uuid, _>("room_id")?),
            catalog_item_id: CatalogItemId::from_uuid(row.try_get::<Uuid, _>("catalog_item_id")?),
            quantity: to_count(row.try_get("quantity")?, "quantity")?,
            reason: row.try_get("reason")?,
            delivered_by: row
                .try_get::<Option<Uuid>, _>("delivered_by")?
                .map(ActorId::from_uuid),
            correlation_id: CorrelationId::from_uuid(row.try_get::<Uuid, _>("correlation_id")?),
            delivered_at: row.try_get("delivered_at")?,
            reconciled_by: row
                .try_get::<Option<Uuid>, _>("reconciled_by")?
                .map(CorrelationId::from_uuid),
        })
    }

    fn row_to_room(row: PgRow) -> Result<Room> {
        let room_type: String = row.try_get("room_type")?;
        let status: String = row.try_get("status")?;

        Ok(Room {
            id: RoomId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            room_type: RoomType::parse(&room_type)
                .ok_or_else(|| StoreError::CorruptRow(format!("unknown room type {room_type}")))?,
            capacity: to_count(row.try_get("capacity")?, "capacity")?,
            status: RoomStatus::parse(&status)
                .ok_or_else(|| StoreError::CorruptRow(format!("unknown room status {status}")))?,
        })
    }

    fn row_to_item(row: PgRow) -> Result<CatalogItem> {
        Ok(CatalogItem {
            id: CatalogItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            unit: row.try_get("unit")?,
            icon: row.try_get("icon")?,
        })
    }
}

fn to_count(value: i64, column: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| StoreError::CorruptRow(format!("{column} out of range: {value}")))
}

fn parse_bucket(value: &str) -> Result<Bucket> {
    Bucket::parse(value).ok_or_else(|| StoreError::CorruptRow(format!("unknown bucket {value}")))
}

#[async_trait]
impl StockStore for PostgresStockStore {
    async fn register_item(&self, catalog_item_id: CatalogItemId) -> Result<StockCounters> {
        sqlx::query(
            r#"
            INSERT INTO inventory_stock (catalog_item_id)
            VALUES ($1)
            ON CONFLICT (catalog_item_id) DO NOTHING
            "#,
        )
        .bind(catalog_item_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            // Stock rows can only exist for catalogued items
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("fk_stock_catalog_item")
            {
                return StoreError::UnknownItem(catalog_item_id);
            }
            StoreError::Database(e)
        })?;

        self.counters(catalog_item_id)
            .await?
            .ok_or(StoreError::UnknownItem(catalog_item_id))
    }

    async fn counters(&self, catalog_item_id: CatalogItemId) -> Result<Option<StockCounters>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT catalog_item_id, total_stock, available_stock, in_use_stock, dirty_stock, updated_at
            FROM inventory_stock
            WHERE catalog_item_id = $1
            "#,
        )
        .bind(catalog_item_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_counters).transpose()
    }

    async fn all_counters(&self) -> Result<Vec<StockCounters>> {
        let rows = sqlx::query(
            r#"
            SELECT catalog_item_id, total_stock, available_stock, in_use_stock, dirty_stock, updated_at
            FROM inventory_stock
            ORDER BY catalog_item_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_counters).collect()
    }

    async fn commit(&self, mut commit: Commit) -> Result<AppliedCommit> {
        validate_commit(&commit)?;

        let ids: Vec<Uuid> = commit.item_ids().into_iter().map(Uuid::from).collect();

        // Start a transaction
        let mut tx = self.pool.begin().await?;

        // Lock the touched rows in ascending id order
        let rows = sqlx::query(
            r#"
            SELECT catalog_item_id, total_stock, available_stock, in_use_stock, dirty_stock, updated_at
            FROM inventory_stock
            WHERE catalog_item_id = ANY($1)
            ORDER BY catalog_item_id ASC
            FOR UPDATE
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await?;

        let current = rows
            .into_iter()
            .map(|row| Self::row_to_counters(row).map(|c| (c.catalog_item_id, c)))
            .collect::<Result<BTreeMap<_, _>>>()?;

        // Held until COMMIT, so the log's time order is commit order
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(LOG_APPEND_LOCK)
            .execute(&mut *tx)
            .await?;
        let now: DateTime<Utc> = sqlx::query_scalar(
            r#"
            SELECT GREATEST(clock_timestamp(), COALESCE(MAX(created_at), '-infinity'::timestamptz))
            FROM inventory_movements
            "#,
        )
        .fetch_one(&mut *tx)
        .await?;
        commit.stamp(now);

        let updated = apply_records(&current, &commit.records)?;

        if let (Some(room_id), Some(correlation_id)) = (commit.room_id(), commit.correlation_id())
            && !commit.reconciles.is_empty()
        {
            let wanted: Vec<Uuid> = commit.reconciles.iter().copied().map(Uuid::from).collect();
            let collected: Vec<Uuid> = sqlx::query_scalar(
                r#"
                UPDATE extra_deliveries
                SET reconciled_by = $1
                WHERE id = ANY($2) AND room_id = $3 AND reconciled_by IS NULL
                RETURNING id
                "#,
            )
            .bind(correlation_id.as_uuid())
            .bind(&wanted)
            .bind(room_id.as_uuid())
            .fetch_all(&mut *tx)
            .await?;

            if let Some(stale) = commit
                .reconciles
                .iter()
                .find(|id| !collected.contains(&id.as_uuid()))
            {
                return Err(StoreError::StaleDelivery(*stale));
            }
        }

        for counters in updated.values() {
            sqlx::query(
                r#"
                UPDATE inventory_stock
                SET total_stock = $2, available_stock = $3, in_use_stock = $4, dirty_stock = $5, updated_at = $6
                WHERE catalog_item_id = $1
                "#,
            )
            .bind(counters.catalog_item_id.as_uuid())
            .bind(i64::from(counters.total))
            .bind(i64::from(counters.available))
            .bind(i64::from(counters.in_use))
            .bind(i64::from(counters.dirty))
            .bind(counters.updated_at)
            .execute(&mut *tx)
            .await?;
        }

        for record in &commit.records {
            sqlx::query(
                r#"
                INSERT INTO inventory_movements
                    (id, catalog_item_id, movement_type, origin, from_status, to_status, quantity,
                     room_id, created_by, correlation_id, notes, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                "#,
            )
            .bind(record.id.as_uuid())
            .bind(record.catalog_item_id.as_uuid())
            .bind(record.kind.as_str())
            .bind(record.origin.as_str())
            .bind(record.from.map(|b| b.as_str()))
            .bind(record.to.map(|b| b.as_str()))
            .bind(i64::from(record.quantity))
            .bind(record.room_id.map(Uuid::from))
            .bind(record.actor_id.map(Uuid::from))
            .bind(record.correlation_id.as_uuid())
            .bind(&record.notes)
            .bind(record.timestamp)
            .execute(&mut *tx)
            .await?;
        }

        for delivery in &commit.deliveries {
            sqlx::query(
                r#"
                INSERT INTO extra_deliveries
                    (id, room_id, catalog_item_id, quantity, reason, delivered_by, correlation_id, delivered_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(delivery.id.as_uuid())
            .bind(delivery.room_id.as_uuid())
            .bind(delivery.catalog_item_id.as_uuid())
            .bind(i64::from(delivery.quantity))
            .bind(&delivery.reason)
            .bind(delivery.delivered_by.map(Uuid::from))
            .bind(delivery.correlation_id.as_uuid())
            .bind(delivery.delivered_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some("fk_delivery_room")
                {
                    return StoreError::UnknownRoom(delivery.room_id);
                }
                StoreError::Database(e)
            })?;
        }

        tx.commit().await.map_err(StoreError::CommitOutcomeUnknown)?;

        tracing::debug!(
            items = updated.len(),
            records = commit.records.len(),
            reconciled = commit.reconciles.len(),
            "stock commit applied"
        );

        Ok(AppliedCommit {
            records: commit.records,
            deliveries: commit.deliveries,
            counters: updated.into_values().collect(),
        })
    }

    async fn query_movements(&self, query: MovementQuery) -> Result<Vec<MovementRecord>> {
        let mut sql = format!("SELECT {MOVEMENT_COLUMNS} FROM inventory_movements WHERE 1=1");
        let mut param_count = 0;

        // Build dynamic query
        if query.catalog_item_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND catalog_item_id = ${param_count}"));
        }
        if query.room_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND room_id = ${param_count}"));
        }
        if query.kinds.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND movement_type = ANY(${param_count})"));
        }
        if query.origins.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND origin = ANY(${param_count})"));
        }
        if query.correlation_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND correlation_id = ${param_count}"));
        }
        if query.from_timestamp.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND created_at >= ${param_count}"));
        }
        if query.to_timestamp.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND created_at <= ${param_count}"));
        }

        sql.push_str(" ORDER BY created_at DESC, seq DESC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        // Build and execute query with parameters
        let mut sqlx_query = sqlx::query(&sql);

        if let Some(id) = query.catalog_item_id {
            sqlx_query = sqlx_query.bind(id.as_uuid());
        }
        if let Some(id) = query.room_id {
            sqlx_query = sqlx_query.bind(id.as_uuid());
        }
        if let Some(kinds) = query.kinds {
            let kinds: Vec<&str> = kinds.iter().map(|k| k.as_str()).collect();
            sqlx_query = sqlx_query.bind(kinds);
        }
        if let Some(origins) = query.origins {
            let origins: Vec<&str> = origins.iter().map(|o| o.as_str()).collect();
            sqlx_query = sqlx_query.bind(origins);
        }
        if let Some(id) = query.correlation_id {
            sqlx_query = sqlx_query.bind(id.as_uuid());
        }
        if let Some(from_ts) = query.from_timestamp {
            sqlx_query = sqlx_query.bind(from_ts);
        }
        if let Some(to_ts) = query.to_timestamp {
            sqlx_query = sqlx_query.bind(to_ts);
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(i64::try_from(offset).unwrap_or(i64::MAX));
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_movement).collect()
    }

    async fn stream_movements(&self, query: MovementQuery) -> Result<MovementStream> {
        Ok(paged_stream(self.clone(), query, STREAM_PAGE_SIZE))
    }

    async fn deliveries_for_room(&self, room_id: RoomId) -> Result<Vec<ExtraDelivery>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {DELIVERY_COLUMNS}
            FROM extra_deliveries
            WHERE room_id = $1
            ORDER BY delivered_at DESC
            "#
        ))
        .bind(room_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_delivery).collect()
    }

    async fn outstanding_deliveries(&self, room_id: RoomId) -> Result<Vec<ExtraDelivery>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {DELIVERY_COLUMNS}
            FROM extra_deliveries
            WHERE room_id = $1 AND reconciled_by IS NULL
            ORDER BY delivered_at DESC
            "#
        ))
        .bind(room_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_delivery).collect()
    }

    async fn recent_deliveries(&self, limit: usize) -> Result<Vec<ExtraDelivery>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {DELIVERY_COLUMNS}
            FROM extra_deliveries
            ORDER BY delivered_at DESC
            LIMIT $1
            "#
        ))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_delivery).collect()
    }
}

#[async_trait]
impl ReferenceStore for PostgresStockStore {
    async fn catalog_item(&self, id: CatalogItemId) -> Result<Option<CatalogItem>> {
        let row: Option<PgRow> =
            sqlx::query("SELECT id, name, unit, icon FROM catalog_items WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;

        row.map(Self::row_to_item).transpose()
    }

    async fn catalog_items(&self) -> Result<Vec<CatalogItem>> {
        let rows = sqlx::query("SELECT id, name, unit, icon FROM catalog_items ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_item).collect()
    }

    async fn room(&self, id: RoomId) -> Result<Option<Room>> {
        let row: Option<PgRow> = sqlx::query(
            "SELECT id, name, room_type, capacity, status FROM rooms WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_room).transpose()
    }

    async fn rooms(&self) -> Result<Vec<Room>> {
        let rows =
            sqlx::query("SELECT id, name, room_type, capacity, status FROM rooms ORDER BY name ASC")
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(Self::row_to_room).collect()
    }

    async fn room_requirements(&self, room_id: RoomId) -> Result<Vec<RoomLinenRequirement>> {
        let rows = sqlx::query(
            r#"
            SELECT room_id, catalog_item_id, quantity
            FROM room_linen_config
            WHERE room_id = $1
            ORDER BY catalog_item_id ASC
            "#,
        )
        .bind(room_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<RoomLinenRequirement> {
                Ok(RoomLinenRequirement {
                    room_id: RoomId::from_uuid(row.try_get::<Uuid, _>("room_id")?),
                    catalog_item_id: CatalogItemId::from_uuid(
                        row.try_get::<Uuid, _>("catalog_item_id")?,
                    ),
                    quantity: to_count(row.try_get("quantity")?, "quantity")?,
                })
            })
            .collect()
    }
}
