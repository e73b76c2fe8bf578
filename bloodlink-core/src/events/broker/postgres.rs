use super::{Broker, BrokerError, Delivery, SUBSCRIPTION_BUFFER};
use crate::events::{DomainEvent, Topic};
use crate::framework::DatabaseProcessor;
use async_trait::async_trait;
use kanau::processor::Processor;
use std::collections::HashMap;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Rows fetched per poll.
const POLL_BATCH: i64 = 500;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BrokerMessage {
    pub id: i64,
    pub topic: String,
    pub payload: serde_json::Value,
    pub published_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct AppendBrokerMessage {
    pub topic: Topic,
    pub payload: serde_json::Value,
    pub published_at: OffsetDateTime,
}

impl Processor<AppendBrokerMessage> for DatabaseProcessor {
    type Output = i64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:AppendBrokerMessage")]
    async fn process(&self, insert: AppendBrokerMessage) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO broker_messages (topic, payload, published_at)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(insert.topic.name())
        .bind(insert.payload)
        .bind(insert.published_at)
        .fetch_one(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Messages on `topics` with an id greater than `after`, oldest first.
pub struct GetBrokerMessagesAfter {
    pub after: i64,
    pub topics: Vec<String>,
    pub limit: i64,
}

impl Processor<GetBrokerMessagesAfter> for DatabaseProcessor {
    type Output = Vec<BrokerMessage>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetBrokerMessagesAfter")]
    async fn process(
        &self,
        query: GetBrokerMessagesAfter,
    ) -> Result<Vec<BrokerMessage>, sqlx::Error> {
        sqlx::query_as::<_, BrokerMessage>(
            r#"
            SELECT id, topic, payload, published_at
            FROM broker_messages
            WHERE id > $1 AND topic = ANY($2)
            ORDER BY id
            LIMIT $3
            "#,
        )
        .bind(query.after)
        .bind(query.topics)
        .bind(query.limit)
        .fetch_all(&self.pool)
        .await
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ConsumerOffset {
    pub topic: String,
    pub last_id: i64,
}

#[derive(Debug, Clone)]
/// Committed positions of `group` on the given topics.
pub struct GetConsumerOffsets {
    pub group: String,
    pub topics: Vec<String>,
}

impl Processor<GetConsumerOffsets> for DatabaseProcessor {
    type Output = Vec<ConsumerOffset>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetConsumerOffsets")]
    async fn process(
        &self,
        query: GetConsumerOffsets,
    ) -> Result<Vec<ConsumerOffset>, sqlx::Error> {
        sqlx::query_as::<_, ConsumerOffset>(
            r#"
            SELECT topic, last_id
            FROM broker_consumer_offsets
            WHERE group_name = $1 AND topic = ANY($2)
            "#,
        )
        .bind(query.group)
        .bind(query.topics)
        .fetch_all(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
pub struct CommitConsumerOffset {
    pub group: String,
    pub topic: String,
    pub last_id: i64,
}

impl Processor<CommitConsumerOffset> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:CommitConsumerOffset")]
    async fn process(&self, commit: CommitConsumerOffset) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO broker_consumer_offsets (group_name, topic, last_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (group_name, topic) DO UPDATE
            SET last_id = GREATEST(broker_consumer_offsets.last_id, EXCLUDED.last_id),
                updated_at = now()
            "#,
        )
        .bind(commit.group)
        .bind(commit.topic)
        .bind(commit.last_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Event log stored in the `broker_messages` table.
///
/// Offsets are row ids. Subscribers resume after the lowest position their
/// group committed on the requested topics and skip rows already committed
/// on their own topic.
pub struct PgBroker {
    db: DatabaseProcessor,
    poll_interval: Duration,
}

impl PgBroker {
    pub fn new(db: DatabaseProcessor, poll_interval: Duration) -> Self {
        Self { db, poll_interval }
    }
}

#[async_trait]
impl Broker for PgBroker {
    async fn connect(&self) -> Result<(), BrokerError> {
        sqlx::query("SELECT 1 FROM broker_messages LIMIT 1")
            .execute(&self.db.pool)
            .await?;
        Ok(())
    }

    async fn publish(&self, event: &DomainEvent) -> Result<(), BrokerError> {
        let id = self
            .db
            .process(AppendBrokerMessage {
                topic: event.topic,
                payload: event.payload.clone(),
                published_at: event.timestamp,
            })
            .await?;
        debug!(topic = %event.topic, id, "Event appended to broker log");
        Ok(())
    }

    async fn subscribe(
        &self,
        group: &str,
        topics: &[Topic],
    ) -> Result<mpsc::Receiver<Delivery>, BrokerError> {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let db = self.db.clone();
        let names: Vec<String> = topics.iter().map(|t| t.name().to_owned()).collect();
        let committed: HashMap<String, i64> = self
            .db
            .process(GetConsumerOffsets {
                group: group.to_owned(),
                topics: names.clone(),
            })
            .await?
            .into_iter()
            .map(|o| (o.topic, o.last_id))
            .collect();
        let mut cursor = names
            .iter()
            .map(|name| committed.get(name).copied().unwrap_or(0))
            .min()
            .unwrap_or(0);
        debug!(group, cursor, "Resuming broker subscription");
        let poll_every = self.poll_interval.max(Duration::from_millis(10));
        let mut interval = tokio::time::interval(poll_every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tx.closed() => return,
                    _ = interval.tick() => {}
                }
                let rows = match db
                    .process(GetBrokerMessagesAfter {
                        after: cursor,
                        topics: names.clone(),
                        limit: POLL_BATCH,
                    })
                    .await
                {
                    Ok(rows) => rows,
                    Err(e) => {
                        warn!(error = %e, "Failed to poll broker log");
                        continue;
                    }
                };
                for row in rows {
                    cursor = row.id;
                    if committed.get(&row.topic).is_some_and(|done| row.id <= *done) {
                        continue;
                    }
                    let Some(topic) = Topic::from_name(&row.topic) else {
                        warn!(
                            topic = %row.topic,
                            id = row.id,
                            "Skipping message on unknown topic"
                        );
                        continue;
                    };
                    let delivery = Delivery {
                        event: DomainEvent {
                            topic,
                            payload: row.payload,
                            timestamp: row.published_at,
                        },
                        offset: row.id,
                    };
                    if tx.send(delivery).await.is_err() {
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn commit(&self, group: &str, topic: Topic, offset: i64) -> Result<(), BrokerError> {
        self.db
            .process(CommitConsumerOffset {
                group: group.to_owned(),
                topic: topic.name().to_owned(),
                last_id: offset,
            })
            .await?;
        Ok(())
    }
}
