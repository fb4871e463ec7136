//! Loyalty-point side effects, decoupled from the login path. Auth code
//! emits events; a worker task hands them to the sink. A failed award never
//! fails a login.

use axum::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Which activity earns the reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "activity_kind")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityKind {
    #[sqlx(rename = "DAILY_LOGIN")]
    DailyLogin,
    #[sqlx(rename = "SIGNUP")]
    Signup,
}

#[derive(Debug, Clone)]
pub struct RewardEvent {
    pub user_id: Uuid,
    pub plan_id: Option<Uuid>,
    pub activity: ActivityKind,
}

/// External awarding collaborator. This service decides when to award and
/// with which classification; point calculation happens behind this trait.
#[async_trait]
pub trait RewardSink: Send + Sync {
    async fn award(&self, event: &RewardEvent) -> anyhow::Result<()>;
}

/// Records each award in the reward_events ledger.
pub struct PgRewardSink {
    db: PgPool,
}

impl PgRewardSink {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RewardSink for PgRewardSink {
    async fn award(&self, event: &RewardEvent) -> anyhow::Result<()> {
        sqlx::query(r#"INSERT INTO reward_events (user_id, activity) VALUES ($1, $2)"#)
            .bind(event.user_id)
            .bind(event.activity)
            .execute(&self.db)
            .await?;
        debug!(user_id = %event.user_id, activity = ?event.activity, "reward recorded");
        Ok(())
    }
}

/// Fire-and-forget handle held by the auth code. `emit` never blocks and
/// never errors the caller.
#[derive(Clone)]
pub struct Dispatcher {
    tx: mpsc::UnboundedSender<RewardEvent>,
}

impl Dispatcher {
    /// Spawn the worker draining events into the sink.
    pub fn start(sink: Arc<dyn RewardSink>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<RewardEvent>();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Err(e) = sink.award(&event).await {
                    error!(error = %e, user_id = %event.user_id, "reward award failed");
                }
            }
        });
        Self { tx }
    }

    /// A dispatcher with no worker behind it, for tests.
    pub fn disconnected() -> Self {
        let (tx, _rx) = mpsc::unbounded_channel();
        Self { tx }
    }

    pub fn emit(&self, event: RewardEvent) {
        if self.tx.send(event).is_err() {
            warn!("reward channel closed; event dropped");
        }
    }
}
