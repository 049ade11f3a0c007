//! PostgreSQL implementation of the persistence layer.
//!
//! Each entity has its own table: key columns for lookups and constraints,
//! plus a JSONB `record` column holding the full row as the engine sees it.
//! One change set is written in a single transaction.

use std::collections::HashMap;

use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::EventSink;
use crate::domain::{
    Certificate, CheckIn, DailyRankingSnapshot, DomainEvent, Enrollment, Event, EventId, Quota,
    ReadingSchedule, Reward,
};
use crate::error::GatewayError;
use crate::service::{ChangeSet, EventAggregate, StoredState};

fn db_error(e: sqlx::Error) -> GatewayError {
    GatewayError::PersistenceError(e.to_string())
}

/// Serialized form of a unit enum variant, e.g. `in_progress`.
fn label<T: Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_owned))
        .unwrap_or_default()
}

/// PostgreSQL-backed persistence layer using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    /// Creates a new persistence layer with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Reads every stored record back for [`crate::service::ReadingEngine::restore`].
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] on database failure or
    /// when a stored record no longer decodes.
    pub async fn load_state(&self) -> Result<StoredState, GatewayError> {
        let events: Vec<Event> =
            records(&self.pool, "SELECT record FROM reading_events ORDER BY created_at, id")
                .await?;
        let schedules: Vec<ReadingSchedule> = records(
            &self.pool,
            "SELECT record FROM reading_schedules ORDER BY event_id, day_number",
        )
        .await?;
        let enrollments: Vec<Enrollment> = records(
            &self.pool,
            "SELECT record FROM enrollments ORDER BY enrolled_at, id",
        )
        .await?;

        let mut schedules_by_event: HashMap<EventId, Vec<ReadingSchedule>> = HashMap::new();
        for schedule in schedules {
            schedules_by_event
                .entry(schedule.event_id)
                .or_default()
                .push(schedule);
        }
        let mut enrollments_by_event: HashMap<EventId, Vec<Enrollment>> = HashMap::new();
        for enrollment in enrollments {
            enrollments_by_event
                .entry(enrollment.event_id)
                .or_default()
                .push(enrollment);
        }
        let aggregates = events
            .into_iter()
            .map(|event| EventAggregate {
                schedules: schedules_by_event.remove(&event.id).unwrap_or_default(),
                enrollments: enrollments_by_event.remove(&event.id).unwrap_or_default(),
                event,
            })
            .collect();

        Ok(StoredState {
            aggregates,
            check_ins: records(&self.pool, "SELECT record FROM check_ins ORDER BY created_at, id")
                .await?,
            rewards: records(&self.pool, "SELECT record FROM rewards ORDER BY created_at, id")
                .await?,
            quotas: records(&self.pool, "SELECT record FROM quotas ORDER BY quota_date, id")
                .await?,
            snapshots: records(
                &self.pool,
                "SELECT record FROM ranking_snapshots WHERE record IS NOT NULL \
                 ORDER BY event_id, ranking_date",
            )
            .await?,
            certificates: records(
                &self.pool,
                "SELECT record FROM certificates WHERE record IS NOT NULL ORDER BY issued_at, id",
            )
            .await?,
        })
    }
}

async fn records<T>(pool: &PgPool, sql: &'static str) -> Result<Vec<T>, GatewayError>
where
    T: DeserializeOwned + Send + Unpin + 'static,
{
    let rows = sqlx::query_scalar::<_, Json<T>>(sql)
        .fetch_all(pool)
        .await
        .map_err(db_error)?;
    Ok(rows.into_iter().map(|Json(record)| record).collect())
}

/// Appends an event to the `domain_events` audit log.
async fn save_event(conn: &mut PgConnection, event: &DomainEvent) -> Result<(), GatewayError> {
    sqlx::query(
        "INSERT INTO domain_events (event_id, event_type, payload, occurred_at) \
         VALUES ($1, $2, $3, $4)",
    )
    .bind(Uuid::from(event.event_id()))
    .bind(event.event_type_str())
    .bind(Json(event))
    .bind(event.timestamp())
    .execute(&mut *conn)
    .await
    .map_err(db_error)?;
    Ok(())
}

/// Upserts the event row, replaces its schedules and upserts enrollments.
async fn save_aggregate(
    conn: &mut PgConnection,
    aggregate: &EventAggregate,
) -> Result<(), GatewayError> {
    let event = &aggregate.event;
    let event_id = Uuid::from(event.id);
    sqlx::query(
        "INSERT INTO reading_events \
         (id, leader_id, status, approval_status, start_date, end_date, record, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         ON CONFLICT (id) DO UPDATE SET \
         status = EXCLUDED.status, approval_status = EXCLUDED.approval_status, \
         start_date = EXCLUDED.start_date, end_date = EXCLUDED.end_date, \
         record = EXCLUDED.record, updated_at = EXCLUDED.updated_at",
    )
    .bind(event_id)
    .bind(Uuid::from(event.leader_id))
    .bind(label(&event.status))
    .bind(label(&event.approval_status))
    .bind(event.start_date)
    .bind(event.end_date)
    .bind(Json(event))
    .bind(event.created_at)
    .bind(event.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(db_error)?;

    sqlx::query("DELETE FROM reading_schedules WHERE event_id = $1")
        .bind(event_id)
        .execute(&mut *conn)
        .await
        .map_err(db_error)?;
    for schedule in &aggregate.schedules {
        sqlx::query(
            "INSERT INTO reading_schedules \
             (id, event_id, schedule_date, day_number, assigned_leader_id, record) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(Uuid::from(schedule.id))
        .bind(event_id)
        .bind(schedule.date)
        .bind(i64::from(schedule.day_number))
        .bind(schedule.assigned_leader_id.map(Uuid::from))
        .bind(Json(schedule))
        .execute(&mut *conn)
        .await
        .map_err(db_error)?;
    }

    for enrollment in &aggregate.enrollments {
        sqlx::query(
            "INSERT INTO enrollments \
             (id, event_id, user_id, enrollment_type, status, record, enrolled_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (event_id, user_id) DO UPDATE SET \
             status = EXCLUDED.status, record = EXCLUDED.record",
        )
        .bind(Uuid::from(enrollment.id))
        .bind(event_id)
        .bind(Uuid::from(enrollment.user_id))
        .bind(label(&enrollment.enrollment_type))
        .bind(label(&enrollment.status))
        .bind(Json(enrollment))
        .bind(enrollment.enrolled_at)
        .execute(&mut *conn)
        .await
        .map_err(db_error)?;
    }
    Ok(())
}

async fn save_check_in(conn: &mut PgConnection, check_in: &CheckIn) -> Result<(), GatewayError> {
    sqlx::query(
        "INSERT INTO check_ins (id, event_id, user_id, check_in_date, record, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (id) DO NOTHING",
    )
    .bind(Uuid::from(check_in.id))
    .bind(Uuid::from(check_in.event_id))
    .bind(Uuid::from(check_in.user_id))
    .bind(check_in.date)
    .bind(Json(check_in))
    .bind(check_in.created_at)
    .execute(&mut *conn)
    .await
    .map_err(db_error)?;
    Ok(())
}

/// Rewards are immutable: a replay of the same id is ignored.
async fn save_reward(conn: &mut PgConnection, reward: &Reward) -> Result<(), GatewayError> {
    sqlx::query(
        "INSERT INTO rewards \
         (id, event_id, giver_id, recipient_id, target_id, amount, record, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (id) DO NOTHING",
    )
    .bind(Uuid::from(reward.id))
    .bind(Uuid::from(reward.event_id))
    .bind(Uuid::from(reward.giver_id))
    .bind(Uuid::from(reward.recipient_id))
    .bind(Uuid::from(reward.target_id))
    .bind(i64::from(reward.amount))
    .bind(Json(reward))
    .bind(reward.created_at)
    .execute(&mut *conn)
    .await
    .map_err(db_error)?;
    Ok(())
}

async fn save_quota(conn: &mut PgConnection, quota: &Quota) -> Result<(), GatewayError> {
    sqlx::query(
        "INSERT INTO quotas (id, user_id, event_id, quota_date, max_allowance, used, record) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         ON CONFLICT (user_id, event_id, quota_date) DO UPDATE SET \
         used = EXCLUDED.used, record = EXCLUDED.record",
    )
    .bind(Uuid::from(quota.id))
    .bind(Uuid::from(quota.user_id))
    .bind(Uuid::from(quota.event_id))
    .bind(quota.date)
    .bind(i64::from(quota.max_allowance))
    .bind(i64::from(quota.used))
    .bind(Json(quota))
    .execute(&mut *conn)
    .await
    .map_err(db_error)?;
    Ok(())
}

/// A forced regeneration replaces the stored rows for the same day.
async fn save_snapshot(
    conn: &mut PgConnection,
    snapshot: &DailyRankingSnapshot,
) -> Result<(), GatewayError> {
    sqlx::query(
        "INSERT INTO ranking_snapshots (event_id, ranking_date, rankings, generated_at, record) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (event_id, ranking_date) \
         DO UPDATE SET rankings = EXCLUDED.rankings, generated_at = EXCLUDED.generated_at, \
         record = EXCLUDED.record",
    )
    .bind(Uuid::from(snapshot.event_id))
    .bind(snapshot.date)
    .bind(Json(&snapshot.rankings))
    .bind(snapshot.generated_at)
    .bind(Json(snapshot))
    .execute(&mut *conn)
    .await
    .map_err(db_error)?;
    Ok(())
}

/// Replays of the same rank are ignored. Any other conflict, a duplicate
/// certificate number in particular, fails the transaction.
async fn save_certificate(
    conn: &mut PgConnection,
    certificate: &Certificate,
) -> Result<(), GatewayError> {
    let total = i64::try_from(certificate.total_amount)
        .map_err(|_| GatewayError::invalid("total_amount", "exceeds BIGINT range"))?;
    let result = sqlx::query(
        "INSERT INTO certificates \
         (id, event_id, user_id, rank, total_amount, certificate_number, expires_at, issued_at, record) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         ON CONFLICT (event_id, rank) DO NOTHING",
    )
    .bind(Uuid::from(certificate.id))
    .bind(Uuid::from(certificate.event_id))
    .bind(Uuid::from(certificate.user_id))
    .bind(i16::from(certificate.rank))
    .bind(total)
    .bind(certificate.certificate_number.as_str())
    .bind(certificate.expires_at)
    .bind(certificate.issued_at)
    .bind(Json(certificate))
    .execute(&mut *conn)
    .await
    .map_err(db_error)?;

    if result.rows_affected() == 0 {
        tracing::debug!(
            event_id = %certificate.event_id,
            rank = certificate.rank,
            "certificate already stored"
        );
    }
    Ok(())
}

impl EventSink for PostgresPersistence {
    async fn store(&self, change: &ChangeSet) -> Result<(), GatewayError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        save_event(&mut tx, &change.event).await?;
        if let Some(aggregate) = &change.aggregate {
            save_aggregate(&mut tx, aggregate).await?;
        }
        if let Some(check_in) = &change.check_in {
            save_check_in(&mut tx, check_in).await?;
        }
        if let Some(reward) = &change.reward {
            save_reward(&mut tx, reward).await?;
        }
        if let Some(quota) = &change.quota {
            save_quota(&mut tx, quota).await?;
        }
        if let Some(snapshot) = &change.snapshot {
            save_snapshot(&mut tx, snapshot).await?;
        }
        if let Some(certificate) = &change.certificate {
            save_certificate(&mut tx, certificate).await?;
        }
        tx.commit().await.map_err(db_error)
    }
}
