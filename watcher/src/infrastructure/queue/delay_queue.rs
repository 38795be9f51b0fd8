//! Redis-backed delay queue.
//!
//! Four structures per queue name:
//! - `waiting` list: items ready for dispatch, consumed FIFO;
//! - `delayed` zset: items scored by their fire time in epoch ms;
//! - `repeating` hash: repetition specs keyed by a caller-chosen key,
//!   distinct from the per-fire items they spawn;
//! - `active` hash and a capped `failed` list for the operational surface.
//!
//! Redis has no native repeat-with-interval, so due repetition specs re-arm
//! themselves when their fire is promoted into the waiting list. LPOP is
//! atomic, so every enqueued item reaches exactly one handler.

use chrono::Utc;
use log::{info, warn};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::infrastructure::queue::error::QueueError;

/// Failed items kept for inspection
const FAILED_LIST_CAP: isize = 100;

/// Scheduling options for a submission
#[derive(Debug, Clone, Default)]
pub struct SubmitOpts {
    /// Delay before the first fire, in milliseconds
    pub delay_ms: Option<u64>,
    /// Fire again this often after the first fire, in milliseconds
    pub repeat_every_ms: Option<u64>,
    /// Key identifying the repetition spec; required with repeat_every_ms
    pub repeat_key: Option<String>,
}

/// One enqueued fire
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub id: String,
    pub payload: Value,
    pub enqueued_at: i64,
}

impl QueueItem {
    fn new(payload: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            payload,
            enqueued_at: Utc::now().timestamp_millis(),
        }
    }

    /// The job id carried in the payload, if any
    pub fn job_id(&self) -> Option<&str> {
        self.payload.get("jobId").and_then(Value::as_str)
    }
}

/// A repetition spec stored in the repeating hash
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepeatEntry {
    pub payload: Value,
    pub every_ms: u64,
    pub next_fire_ms: i64,
}

/// An entry on the failed list
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedItem {
    pub item: QueueItem,
    pub error: String,
    pub failed_at: i64,
}

/// Counters for the operational surface
#[derive(Debug, Clone, Copy, Serialize)]
pub struct QueueCounts {
    pub waiting: u64,
    pub active: u64,
    pub delayed: u64,
    pub repeating: u64,
    pub failed: u64,
}

/// Queue throughput metrics
#[derive(Debug, Default)]
pub struct QueueMetrics {
    pub total_enqueued: AtomicU64,
    pub total_completed: AtomicU64,
    pub total_failed: AtomicU64,
}

/// Redis-backed queue with delayed and repeating dispatch
#[derive(Clone)]
pub struct DelayQueue {
    conn: MultiplexedConnection,
    metrics: Arc<QueueMetrics>,
}

impl DelayQueue {
    /// Connect to the broker
    pub async fn connect(config: &AppConfig) -> Result<Self, QueueError> {
        let client = redis::Client::open(config.redis.url.as_str())
            .map_err(|e| QueueError::ConnectionError(e.to_string()))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::ConnectionError(e.to_string()))?;

        info!("Broker connection established");

        Ok(Self {
            conn,
            metrics: Arc::new(QueueMetrics::default()),
        })
    }

    /// Enqueue a payload according to the given schedule
    pub async fn submit(
        &self,
        name: &str,
        payload: Value,
        opts: SubmitOpts,
    ) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let now = Utc::now().timestamp_millis();

        if let Some(every_ms) = opts.repeat_every_ms {
            let repeat_key = opts.repeat_key.clone().ok_or_else(|| {
                QueueError::SerializationError(
                    "repeat_every_ms requires a repeat_key".to_string(),
                )
            })?;
            let first_delay = opts.delay_ms.unwrap_or(every_ms);
            let entry = RepeatEntry {
                payload,
                every_ms,
                next_fire_ms: now + first_delay as i64,
            };
            let raw = encode(&entry)?;
            let _: () = conn.hset(keys::repeating(name), repeat_key, raw).await?;
            self.metrics.total_enqueued.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }

        let item = QueueItem::new(payload);
        let raw = encode(&item)?;

        match opts.delay_ms {
            Some(delay_ms) if delay_ms > 0 => {
                let fire_at = now + delay_ms as i64;
                let _: () = conn.zadd(keys::delayed(name), raw, fire_at).await?;
            }
            _ => {
                let _: () = conn.rpush(keys::waiting(name), raw).await?;
            }
        }

        self.metrics.total_enqueued.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Promote due work and reserve the next ready item, if any.
    /// The reserved item is tracked in the active hash until the caller
    /// completes or fails it.
    pub async fn reserve_next(&self, name: &str) -> Result<Option<QueueItem>, QueueError> {
        self.promote_due(name).await?;

        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.lpop(keys::waiting(name), None).await?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        let item: QueueItem = decode(&raw)?;
        let _: () = conn.hset(keys::active(name), &item.id, &raw).await?;
        Ok(Some(item))
    }

    /// Mark a reserved item as handled
    pub async fn complete(&self, name: &str, item: &QueueItem) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let _: () = conn.hdel(keys::active(name), &item.id).await?;
        self.metrics.total_completed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Mark a reserved item as failed and keep it on the capped failed list
    pub async fn fail(&self, name: &str, item: &QueueItem, error: &str) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let _: () = conn.hdel(keys::active(name), &item.id).await?;

        let failed = FailedItem {
            item: item.clone(),
            error: error.to_string(),
            failed_at: Utc::now().timestamp_millis(),
        };
        let raw = encode(&failed)?;
        let _: () = conn.lpush(keys::failed(name), raw).await?;
        let _: () = conn.ltrim(keys::failed(name), 0, FAILED_LIST_CAP - 1).await?;

        self.metrics.total_failed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Move due delayed items and due repeat fires into the waiting list
    async fn promote_due(&self, name: &str) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let now = Utc::now().timestamp_millis();

        let due: Vec<String> = conn
            .zrangebyscore(keys::delayed(name), "-inf", now)
            .await?;
        for raw in due {
            let _: () = conn.rpush(keys::waiting(name), &raw).await?;
            let _: () = conn.zrem(keys::delayed(name), &raw).await?;
        }

        let repeating: HashMap<String, String> = conn.hgetall(keys::repeating(name)).await?;
        for (repeat_key, raw) in repeating {
            let Ok(mut entry) = decode::<RepeatEntry>(&raw) else {
                warn!(
                    "[QUEUE] Dropping unreadable repeat entry '{}'",
                    repeat_key
                );
                let _: () = conn.hdel(keys::repeating(name), &repeat_key).await?;
                continue;
            };

            if entry.next_fire_ms > now {
                continue;
            }

            let item = QueueItem::new(entry.payload.clone());
            let _: () = conn.rpush(keys::waiting(name), encode(&item)?).await?;

            // Re-arm relative to now so a stalled consumer does not replay
            // every missed interval as a burst.
            entry.next_fire_ms = now + entry.every_ms as i64;
            let _: () = conn
                .hset(keys::repeating(name), &repeat_key, encode(&entry)?)
                .await?;
        }

        Ok(())
    }

    /// Items waiting for dispatch
    pub async fn list_waiting(&self, name: &str) -> Result<Vec<QueueItem>, QueueError> {
        let mut conn = self.conn.clone();
        let raws: Vec<String> = conn.lrange(keys::waiting(name), 0, -1).await?;
        Ok(raws.iter().filter_map(|raw| decode(raw).ok()).collect())
    }

    /// Items currently reserved by handlers
    pub async fn list_active(&self, name: &str) -> Result<Vec<QueueItem>, QueueError> {
        let mut conn = self.conn.clone();
        let map: HashMap<String, String> = conn.hgetall(keys::active(name)).await?;
        Ok(map.values().filter_map(|raw| decode(raw).ok()).collect())
    }

    /// Items scheduled for a later fire
    pub async fn list_delayed(&self, name: &str) -> Result<Vec<QueueItem>, QueueError> {
        let mut conn = self.conn.clone();
        let raws: Vec<String> = conn.zrange(keys::delayed(name), 0, -1).await?;
        Ok(raws.iter().filter_map(|raw| decode(raw).ok()).collect())
    }

    /// Repetition specs keyed by their repeat key
    pub async fn list_repeating(
        &self,
        name: &str,
    ) -> Result<Vec<(String, RepeatEntry)>, QueueError> {
        let mut conn = self.conn.clone();
        let map: HashMap<String, String> = conn.hgetall(keys::repeating(name)).await?;
        Ok(map
            .into_iter()
            .filter_map(|(key, raw)| decode(&raw).ok().map(|entry| (key, entry)))
            .collect())
    }

    /// Recently failed items, newest first
    pub async fn list_failed(&self, name: &str) -> Result<Vec<FailedItem>, QueueError> {
        let mut conn = self.conn.clone();
        let raws: Vec<String> = conn.lrange(keys::failed(name), 0, -1).await?;
        Ok(raws.iter().filter_map(|raw| decode(raw).ok()).collect())
    }

    /// Current queue counters
    pub async fn counts(&self, name: &str) -> Result<QueueCounts, QueueError> {
        let mut conn = self.conn.clone();
        Ok(QueueCounts {
            waiting: conn.llen(keys::waiting(name)).await?,
            active: conn.hlen(keys::active(name)).await?,
            delayed: conn.zcard(keys::delayed(name)).await?,
            repeating: conn.hlen(keys::repeating(name)).await?,
            failed: conn.llen(keys::failed(name)).await?,
        })
    }

    /// Remove waiting and delayed fires carrying the given job id, plus its
    /// repetition spec. Already-reserved items are left to finish.
    pub async fn remove_by_job(&self, name: &str, job_id: &str) -> Result<u64, QueueError> {
        let mut conn = self.conn.clone();
        let mut removed = 0u64;

        let waiting: Vec<String> = conn.lrange(keys::waiting(name), 0, -1).await?;
        for raw in waiting {
            if let Ok(item) = decode::<QueueItem>(&raw) {
                if item.job_id() == Some(job_id) {
                    let count: i64 = conn.lrem(keys::waiting(name), 1, &raw).await?;
                    removed += count as u64;
                }
            }
        }

        let delayed: Vec<String> = conn.zrange(keys::delayed(name), 0, -1).await?;
        for raw in delayed {
            if let Ok(item) = decode::<QueueItem>(&raw) {
                if item.job_id() == Some(job_id) {
                    let count: i64 = conn.zrem(keys::delayed(name), &raw).await?;
                    removed += count as u64;
                }
            }
        }

        if self.remove_repeating(name, job_id).await? {
            removed += 1;
        }

        Ok(removed)
    }

    /// Cancel future fires of a repetition spec. Already-dispatched fires
    /// are unaffected.
    pub async fn remove_repeating(&self, name: &str, repeat_key: &str) -> Result<bool, QueueError> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.hdel(keys::repeating(name), repeat_key).await?;
        Ok(removed > 0)
    }

    /// Drop every structure of the queue
    pub async fn obliterate(&self, name: &str) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .del(&[
                keys::waiting(name),
                keys::delayed(name),
                keys::repeating(name),
                keys::active(name),
                keys::failed(name),
            ])
            .await?;
        Ok(())
    }

    /// Queue throughput counters
    pub fn metrics(&self) -> (u64, u64, u64) {
        (
            self.metrics.total_enqueued.load(Ordering::Relaxed),
            self.metrics.total_completed.load(Ordering::Relaxed),
            self.metrics.total_failed.load(Ordering::Relaxed),
        )
    }
}

mod keys {
    pub fn waiting(name: &str) -> String {
        format!("watchq:{}:waiting", name)
    }

    pub fn delayed(name: &str) -> String {
        format!("watchq:{}:delayed", name)
    }

    pub fn repeating(name: &str) -> String {
        format!("watchq:{}:repeating", name)
    }

    pub fn active(name: &str) -> String {
        format!("watchq:{}:active", name)
    }

    pub fn failed(name: &str) -> String {
        format!("watchq:{}:failed", name)
    }
}

fn encode<T: Serialize>(value: &T) -> Result<String, QueueError> {
    serde_json::to_string(value).map_err(|e| QueueError::SerializationError(e.to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, QueueError> {
    serde_json::from_str(raw).map_err(|e| QueueError::SerializationError(e.to_string()))
}
