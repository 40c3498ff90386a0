//! Delivery queue manager
//!
//! Sends approved cards to the store and keeps the ones it could not deliver
//! in a durable, retry-bounded offline queue.
//!
//! # Item lifecycle
//! `pending` → `delivering` → `delivered` (removed), or back to `pending`
//! with `retry_count + 1`, or `dropped` once `retry_count` reaches
//! `max_retries`.
//!
//! # Durability
//! The whole queue is one JSON array stored under [`QUEUE_STORAGE_KEY`]. It is
//! written after every mutation and read once, in [`DeliveryQueue::load`].
//! "Queued" is the only durability guarantee; delivery may repeat after a
//! crash mid-pass, which the store reports as a duplicate.

use crate::config::{Settings, DEFAULT_SYNC_INTERVAL_SECS};
use crate::error::{PipelineError, PipelineResult};
use crate::models::{Card, QueuedItem};
use crate::services::store_client::{CardStore, StoreError};
use cardgen_common::db::KeyValueStore;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Key holding the persisted queue in the key/value store
pub const QUEUE_STORAGE_KEY: &str = "cardgen_sync_queue";

/// Result of one delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Store accepted the card (or already held it)
    Delivered,
    /// Store unavailable; card persisted in the offline queue
    Queued,
    /// Store unavailable and offline queuing is disabled
    Failed,
}

/// Counts across a multi-card delivery
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub queued: usize,
    pub failed: usize,
}

impl DeliveryReport {
    pub fn record(&mut self, outcome: DeliveryOutcome) {
        match outcome {
            DeliveryOutcome::Delivered => self.delivered += 1,
            DeliveryOutcome::Queued => self.queued += 1,
            DeliveryOutcome::Failed => self.failed += 1,
        }
    }

    pub fn summary_line(&self) -> String {
        format!(
            "{} delivered, {} queued, {} failed",
            self.delivered, self.queued, self.failed
        )
    }
}

/// Owns the offline queue and all deliveries to the store
pub struct DeliveryQueue {
    store: Arc<dyn CardStore>,
    kv: Arc<dyn KeyValueStore>,
    settings: RwLock<Settings>,
    /// Never held across store calls
    queue: Mutex<Vec<QueuedItem>>,
    processing: AtomicBool,
}

/// Clears the busy flag however `process_queue` exits
struct ProcessingGuard<'a>(&'a AtomicBool);

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl DeliveryQueue {
    /// Create the manager, rehydrating any queue persisted by a previous run
    ///
    /// # Errors
    /// Fails only when the key/value store cannot be read. A corrupt blob is
    /// logged and replaced by an empty queue.
    pub async fn load(
        store: Arc<dyn CardStore>,
        kv: Arc<dyn KeyValueStore>,
        settings: Settings,
    ) -> PipelineResult<Self> {
        let items = match kv.get(QUEUE_STORAGE_KEY).await? {
            Some(blob) => match serde_json::from_str::<Vec<QueuedItem>>(&blob) {
                Ok(items) => items,
                Err(e) => {
                    error!(error = %e, "Persisted delivery queue is corrupt, starting empty");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        if !items.is_empty() {
            info!(queued = items.len(), "Rehydrated delivery queue");
        }

        Ok(Self {
            store,
            kv,
            settings: RwLock::new(settings),
            queue: Mutex::new(items),
            processing: AtomicBool::new(false),
        })
    }

    /// Replace runtime settings; takes effect on the next call
    pub async fn reconfigure(&self, settings: Settings) {
        *self.settings.write().await = settings;
        debug!("Delivery settings replaced");
    }

    pub async fn queue_len(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// Snapshot of the queued items
    pub async fn queued_items(&self) -> Vec<QueuedItem> {
        self.queue.lock().await.clone()
    }

    /// Deliver one card, queuing it when the store is unavailable
    pub async fn deliver(&self, card: &Card) -> DeliveryOutcome {
        let settings = self.settings.read().await.clone();

        if !self.store.is_reachable().await {
            return self.queue_or_fail(card, &settings, "store unreachable").await;
        }

        let result = match self.ensure_deck(&settings.deck_name).await {
            Ok(()) => self.add_card(card, &settings).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                debug!(front = %card.front, deck = %settings.deck_name, "Card delivered");
                DeliveryOutcome::Delivered
            }
            Err(e) => {
                warn!(error = %e, "Card delivery failed");
                self.queue_or_fail(card, &settings, &e.to_string()).await
            }
        }
    }

    /// Deliver cards one after another
    pub async fn deliver_all(&self, cards: &[Card]) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for card in cards {
            report.record(self.deliver(card).await);
        }

        info!(
            delivered = report.delivered,
            queued = report.queued,
            failed = report.failed,
            "Delivery complete"
        );
        report
    }

    /// Approval hook: deliver right away when auto-sync is on
    ///
    /// Returns `None` when auto-sync is off; the cards stay with the caller.
    pub async fn on_approved(&self, cards: &[Card]) -> Option<DeliveryReport> {
        let auto_sync = self.settings.read().await.auto_sync_on_approval;
        if !auto_sync {
            debug!(cards = cards.len(), "Auto-sync disabled, leaving approved cards");
            return None;
        }
        Some(self.deliver_all(cards).await)
    }

    /// Replay the offline queue against the store
    ///
    /// Returns the number of items delivered. Returns 0 without touching the
    /// queue when another pass is already running or the store is
    /// unreachable.
    pub async fn process_queue(&self) -> usize {
        if self
            .processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Queue processing already in progress");
            return 0;
        }
        let _guard = ProcessingGuard(&self.processing);

        let settings = self.settings.read().await.clone();

        let snapshot = self.queue.lock().await.clone();
        if snapshot.is_empty() {
            return 0;
        }

        if !self.store.is_reachable().await {
            debug!(queued = snapshot.len(), "Store unreachable, skipping queue pass");
            return 0;
        }

        info!(queued = snapshot.len(), "Processing delivery queue");

        let deck_ready = match self.ensure_deck(&settings.deck_name).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, deck = %settings.deck_name, "Could not prepare deck");
                false
            }
        };

        let snapshot_ids: HashSet<Uuid> = snapshot.iter().map(|item| item.id).collect();
        let mut survivors = Vec::new();
        let mut delivered = 0;

        for mut item in snapshot {
            let result = if deck_ready {
                self.add_card(&item.card, &settings).await
            } else {
                Err(StoreError::RpcError("deck unavailable".to_string()))
            };

            match result {
                Ok(()) => {
                    delivered += 1;
                    debug!(item_id = %item.id, "Queued card delivered");
                }
                Err(e) => {
                    item.retry_count += 1;
                    if item.retry_count < settings.max_retries {
                        debug!(
                            item_id = %item.id,
                            retry_count = item.retry_count,
                            error = %e,
                            "Queued card delivery failed, will retry"
                        );
                        survivors.push(item);
                    } else {
                        warn!(
                            item_id = %item.id,
                            queued_at = %item.queued_at,
                            error = %e,
                            "{}, dropping card",
                            PipelineError::RetryExhausted {
                                attempts: item.retry_count
                            }
                        );
                    }
                }
            }
        }

        let remaining = {
            let mut queue = self.queue.lock().await;
            // Items queued during the pass stay ahead of retried ones
            queue.retain(|item| !snapshot_ids.contains(&item.id));
            queue.extend(survivors);
            if let Err(e) = self.persist(&queue).await {
                error!(error = %e, "Failed to persist delivery queue");
            }
            queue.len()
        };

        info!(delivered, remaining, "Queue pass complete");
        delivered
    }

    /// Run [`process_queue`](Self::process_queue) every `interval` until aborted
    pub fn spawn_periodic_sync(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let interval = if interval.is_zero() {
            warn!("Sync interval of zero is invalid, using default");
            Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS)
        } else {
            interval
        };

        let queue = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let delivered = queue.process_queue().await;
                if delivered > 0 {
                    info!(delivered, "Periodic sync delivered queued cards");
                }
            }
        })
    }

    async fn queue_or_fail(&self, card: &Card, settings: &Settings, reason: &str) -> DeliveryOutcome {
        if !settings.offline_queue_enabled {
            warn!(reason, "Offline queue disabled, card not delivered");
            return DeliveryOutcome::Failed;
        }

        let item = QueuedItem::new(card.clone());
        let mut queue = self.queue.lock().await;
        info!(item_id = %item.id, reason, "Card queued for later delivery");
        queue.push(item);

        if let Err(e) = self.persist(&queue).await {
            error!(error = %e, "Failed to persist delivery queue");
        }

        DeliveryOutcome::Queued
    }

    async fn ensure_deck(&self, deck: &str) -> Result<(), StoreError> {
        let decks = self.store.deck_names().await?;
        if !decks.iter().any(|d| d == deck) {
            self.store.create_deck(deck).await?;
        }
        Ok(())
    }

    /// Add a note, treating a duplicate rejection as success
    async fn add_card(&self, card: &Card, settings: &Settings) -> Result<(), StoreError> {
        match self
            .store
            .add_note(&settings.deck_name, &settings.note_type, card)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.is_duplicate() => {
                debug!(front = %card.front, "Store already holds card");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn persist(&self, items: &[QueuedItem]) -> PipelineResult<()> {
        let blob = serde_json::to_string(items)?;
        self.kv.set(QUEUE_STORAGE_KEY, &blob).await?;
        Ok(())
    }
}
