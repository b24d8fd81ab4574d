use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Actor, ActorRole, EventEnvelope, EventId, EventStoreError, Result, Snapshot, SubmissionId,
    UserId, Version,
    store::{AppendOptions, EventStore, EventStream, validate_events_for_append},
};

const SELECT_EVENTS: &str = r#"
    SELECT id, event_type, schema_version, submission_id, aggregate_type, sequence,
           timestamp, actor_id, actor_name, actor_role, payload, metadata
    FROM events
"#;

/// PostgreSQL-backed event store implementation.
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    /// Creates a new PostgreSQL event store.
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

    fn row_to_event(row: PgRow) -> Result<EventEnvelope> {
        let metadata_json: serde_json::Value = row.try_get("metadata")?;
        let metadata: HashMap<String, serde_json::Value> = serde_json::from_value(metadata_json)?;

        let role_name: String = row.try_get("actor_role")?;
        let role = ActorRole::parse(&role_name).ok_or_else(|| {
            EventStoreError::InvalidAppend(format!("unknown actor role in store: {role_name}"))
        })?;
        let schema_version: i16 = row.try_get("schema_version")?;

        Ok(EventEnvelope {
            event_id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
            event_type: row.try_get("event_type")?,
            schema_version: schema_version as u16,
            submission_id: SubmissionId::from_uuid(row.try_get::<Uuid, _>("submission_id")?),
            aggregate_type: row.try_get("aggregate_type")?,
            sequence: Version::new(row.try_get("sequence")?),
            timestamp: row.try_get("timestamp")?,
            actor: Actor {
                id: UserId::new(row.try_get("actor_id")?),
                name: row.try_get("actor_name")?,
                role,
            },
            payload: row.try_get("payload")?,
            metadata,
        })
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        validate_events_for_append(&events)?;

        let first_event = &events[0];
        let submission_id = first_event.submission_id;

        let mut tx = self.pool.begin().await?;

        if let Some(expected) = options.expected_version {
            let current_version: Option<i64> =
                sqlx::query_scalar("SELECT MAX(sequence) FROM events WHERE submission_id = $1")
                    .bind(submission_id.as_uuid())
                    .fetch_one(&mut *tx)
                    .await?;

            let actual = Version::new(current_version.unwrap_or(0));

            if actual != expected {
                metrics::counter!("event_store_conflicts_total").increment(1);
                return Err(EventStoreError::ConcurrencyConflict {
                    submission_id,
                    expected,
                    actual,
                });
            }
        }

        let mut last_version = Version::initial();
        for event in &events {
            let metadata_json = serde_json::to_value(&event.metadata)?;

            sqlx::query(
                r#"
                INSERT INTO events (id, event_type, schema_version, submission_id, aggregate_type,
                                    sequence, timestamp, actor_id, actor_name, actor_role,
                                    payload, metadata)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                "#,
            )
            .bind(event.event_id.as_uuid())
            .bind(&event.event_type)
            .bind(event.schema_version as i16)
            .bind(event.submission_id.as_uuid())
            .bind(&event.aggregate_type)
            .bind(event.sequence.as_i64())
            .bind(event.timestamp)
            .bind(event.actor.id.as_i64())
            .bind(&event.actor.name)
            .bind(event.actor.role.as_str())
            .bind(&event.payload)
            .bind(metadata_json)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e {
                    match db_err.constraint() {
                        Some("unique_submission_sequence") => {
                            metrics::counter!("event_store_conflicts_total").increment(1);
                            return EventStoreError::ConcurrencyConflict {
                                submission_id,
                                expected: options.expected_version.unwrap_or(Version::initial()),
                                actual: event.sequence,
                            };
                        }
                        Some("events_pkey") => {
                            return EventStoreError::DuplicateEvent(event.event_id);
                        }
                        _ => {}
                    }
                }
                EventStoreError::Database(e)
            })?;

            last_version = event.sequence;
        }

        tx.commit().await?;
        tracing::debug!(
            submission_id = %submission_id,
            count = events.len(),
            version = %last_version,
            "appended events"
        );
        Ok(last_version)
    }

    async fn get_events(&self, submission_id: SubmissionId) -> Result<Vec<EventEnvelope>> {
        let rows = sqlx::query(&format!(
            "{SELECT_EVENTS} WHERE submission_id = $1 ORDER BY sequence ASC"
        ))
        .bind(submission_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn get_events_from_version(
        &self,
        submission_id: SubmissionId,
        from_version: Version,
    ) -> Result<Vec<EventEnvelope>> {
        let rows = sqlx::query(&format!(
            "{SELECT_EVENTS} WHERE submission_id = $1 AND sequence >= $2 ORDER BY sequence ASC"
        ))
        .bind(submission_id.as_uuid())
        .bind(from_version.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        use futures_util::StreamExt;

        // The query string must outlive the returned stream.
        let sql: &'static str = "
            SELECT id, event_type, schema_version, submission_id, aggregate_type, sequence,
                   timestamp, actor_id, actor_name, actor_role, payload, metadata
            FROM events
            ORDER BY global_position ASC
        ";
        let stream = sqlx::query(sql)
            .fetch(&self.pool)
            .map(|result| match result {
                Ok(row) => Self::row_to_event(row),
                Err(e) => Err(EventStoreError::Database(e)),
            });

        Ok(Box::pin(stream))
    }

    async fn get_stream_version(&self, submission_id: SubmissionId) -> Result<Option<Version>> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(sequence) FROM events WHERE submission_id = $1")
                .bind(submission_id.as_uuid())
                .fetch_one(&self.pool)
                .await?;

        Ok(version.map(Version::new))
    }

    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO snapshots (submission_id, aggregate_type, version, timestamp, state)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (submission_id) DO UPDATE SET
                aggregate_type = EXCLUDED.aggregate_type,
                version = EXCLUDED.version,
                timestamp = EXCLUDED.timestamp,
                state = EXCLUDED.state
            "#,
        )
        .bind(snapshot.submission_id.as_uuid())
        .bind(&snapshot.aggregate_type)
        .bind(snapshot.version.as_i64())
        .bind(snapshot.timestamp)
        .bind(&snapshot.state)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_snapshot(&self, submission_id: SubmissionId) -> Result<Option<Snapshot>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT submission_id, aggregate_type, version, timestamp, state
            FROM snapshots
            WHERE submission_id = $1
            "#,
        )
        .bind(submission_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(Snapshot {
                submission_id: SubmissionId::from_uuid(row.try_get::<Uuid, _>("submission_id")?),
                aggregate_type: row.try_get("aggregate_type")?,
                version: Version::new(row.try_get("version")?),
                timestamp: row.try_get::<DateTime<Utc>, _>("timestamp")?,
                state: row.try_get("state")?,
            })),
            None => Ok(None),
        }
    }
}
