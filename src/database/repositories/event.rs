//! Event repository implementation

use sqlx::{PgPool, Postgres, Transaction};
use chrono::Utc;
use crate::models::event::{Event, EventQuery, CreateEventRequest, UpdateEventRequest};
use crate::utils::errors::MaabaraError;
use crate::utils::helpers::like_pattern;

const EVENT_COLUMNS: &str = "id, title, description, category_id, venue, starts_at, ends_at, price, capacity, image_url, cpd_points, certificates_offered, is_published, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct EventRepository {
    pool: PgPool,
}

impl EventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new event
    pub async fn create(&self, request: CreateEventRequest) -> Result<Event, MaabaraError> {
        let event = sqlx::query_as::<_, Event>(&format!(
            r#"
            INSERT INTO events (title, description, category_id, venue, starts_at, ends_at, price, capacity, image_url, cpd_points, certificates_offered, is_published, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13)
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(request.title)
        .bind(request.description)
        .bind(request.category_id)
        .bind(request.venue)
        .bind(request.starts_at)
        .bind(request.ends_at)
        .bind(request.price)
        .bind(request.capacity)
        .bind(request.image_url)
        .bind(request.cpd_points)
        .bind(request.certificates_offered)
        .bind(request.is_published)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(event)
    }

    /// Find event by ID
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Event>, MaabaraError> {
        let event = sqlx::query_as::<_, Event>(&format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(event)
    }

    /// Lock the event row for the rest of the transaction
    ///
    /// Serialises concurrent bookings for the same event so the capacity
    /// check and the insert see the same seat count.
    pub async fn lock_for_booking(&self, tx: &mut Transaction<'_, Postgres>, id: i64) -> Result<Option<Event>, MaabaraError> {
        let event = sqlx::query_as::<_, Event>(&format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1 FOR UPDATE"))
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;

        Ok(event)
    }

    /// Update event
    ///
    /// Nullable columns are bound as a "present" flag plus a value so an
    /// explicit `null` clears them.
    pub async fn update(&self, id: i64, request: UpdateEventRequest) -> Result<Event, MaabaraError> {
        let event = sqlx::query_as::<_, Event>(&format!(
            r#"
            UPDATE events
            SET title = COALESCE($2, title),
                description = CASE WHEN $3 THEN $4::TEXT ELSE description END,
                category_id = CASE WHEN $5 THEN $6::BIGINT ELSE category_id END,
                venue = CASE WHEN $7 THEN $8::TEXT ELSE venue END,
                starts_at = COALESCE($9, starts_at),
                ends_at = CASE WHEN $10 THEN $11::TIMESTAMPTZ ELSE ends_at END,
                price = COALESCE($12, price),
                capacity = CASE WHEN $13 THEN $14::INTEGER ELSE capacity END,
                image_url = CASE WHEN $15 THEN $16::TEXT ELSE image_url END,
                cpd_points = CASE WHEN $17 THEN $18::INTEGER ELSE cpd_points END,
                certificates_offered = COALESCE($19, certificates_offered),
                is_published = COALESCE($20, is_published),
                updated_at = $21
            WHERE id = $1
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(request.title)
        .bind(request.description.is_some())
        .bind(request.description.flatten())
        .bind(request.category_id.is_some())
        .bind(request.category_id.flatten())
        .bind(request.venue.is_some())
        .bind(request.venue.flatten())
        .bind(request.starts_at)
        .bind(request.ends_at.is_some())
        .bind(request.ends_at.flatten())
        .bind(request.price)
        .bind(request.capacity.is_some())
        .bind(request.capacity.flatten())
        .bind(request.image_url.is_some())
        .bind(request.image_url.flatten())
        .bind(request.cpd_points.is_some())
        .bind(request.cpd_points.flatten())
        .bind(request.certificates_offered)
        .bind(request.is_published)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(MaabaraError::EventNotFound { event_id: id })?;

        Ok(event)
    }

    /// Delete event
    ///
    /// Events that already have bookings are protected by the foreign key
    /// and must be unpublished instead.
    pub async fn delete(&self, id: i64) -> Result<(), MaabaraError> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| match MaabaraError::from(e) {
                err if err.sql_state().as_deref() == Some("23503") => {
                    MaabaraError::Conflict("Event has bookings; unpublish it instead".to_string())
                }
                err => err,
            })?;

        if result.rows_affected() == 0 {
            return Err(MaabaraError::EventNotFound { event_id: id });
        }

        Ok(())
    }

    /// List events, optionally restricted to published ones
    pub async fn list(&self, query: &EventQuery, published_only: bool, limit: i64, offset: i64) -> Result<Vec<Event>, MaabaraError> {
        let search = query
            .search
            .as_deref()
            .and_then(like_pattern);

        let events = sqlx::query_as::<_, Event>(&format!(
            r#"
            SELECT {EVENT_COLUMNS} FROM events
            WHERE ($1::BIGINT IS NULL OR category_id = $1)
              AND ($2 = FALSE OR starts_at > NOW())
              AND ($3 = FALSE OR is_published = TRUE)
              AND ($4::TEXT IS NULL OR title ILIKE $4 OR venue ILIKE $4)
            ORDER BY starts_at ASC
            LIMIT $5 OFFSET $6
            "#
        ))
        .bind(query.category_id)
        .bind(query.upcoming)
        .bind(published_only)
        .bind(search)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    /// Seats held by pending and confirmed bookings
    pub async fn seats_taken(&self, event_id: i64) -> Result<i64, MaabaraError> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COALESCE(SUM(quantity), 0)::BIGINT FROM bookings WHERE event_id = $1 AND status <> 'cancelled'"
        )
        .bind(event_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.0)
    }

    /// Seats taken, read inside a booking transaction
    pub async fn seats_taken_in(&self, tx: &mut Transaction<'_, Postgres>, event_id: i64) -> Result<i64, MaabaraError> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COALESCE(SUM(quantity), 0)::BIGINT FROM bookings WHERE event_id = $1 AND status <> 'cancelled'"
        )
        .bind(event_id)
        .fetch_one(&mut **tx)
        .await?;

        Ok(count.0)
    }

    /// Count events, total and published
    pub async fn counts(&self) -> Result<(i64, i64), MaabaraError> {
        let counts: (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(*) FILTER (WHERE is_published) FROM events"
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(counts)
    }
}
