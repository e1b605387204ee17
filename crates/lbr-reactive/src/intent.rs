//! Path intents and the installer contract

use async_trait::async_trait;
use dashmap::DashMap;
use lbr_common::{Criterion, FlowKey, RoutingError, RoutingResult};
use lbr_path::ScoredPath;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// Opaque handle of a submitted intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntentId(pub u64);

impl fmt::Display for IntentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// Request to forward one flow along an explicit path
#[derive(Debug, Clone)]
pub struct PathIntent {
    /// Submitting application
    pub app: String,
    /// Rule priority
    pub priority: u32,
    /// Flow the intent matches
    pub key: FlowKey,
    /// Links to program
    pub path: ScoredPath,
}

impl PathIntent {
    /// Match criteria
    pub fn selector(&self) -> [Criterion; 3] {
        self.key.criteria()
    }
}

/// External installer of path intents
#[async_trait]
pub trait IntentService: Send + Sync {
    /// Submit an intent for installation
    async fn submit(&self, intent: PathIntent) -> RoutingResult<IntentId>;

    /// Uninstall a submitted intent
    async fn withdraw(&self, id: IntentId) -> RoutingResult<()>;

    /// Forget a withdrawn intent
    async fn purge(&self, id: IntentId) -> RoutingResult<()>;
}

/// Lifecycle state of an intent held by [`InMemoryIntentService`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentState {
    /// Submitted and active
    Installed,
    /// Withdrawn, awaiting purge
    Withdrawn,
}

/// Intent store for tests and simulation
#[derive(Default)]
pub struct InMemoryIntentService {
    next_id: AtomicU64,
    intents: DashMap<IntentId, (PathIntent, IntentState)>,
    submit_delay: Option<Duration>,
    fail_submit: AtomicBool,
    fail_withdraw: AtomicBool,
    submitted: AtomicU64,
    purged: AtomicU64,
}

impl InMemoryIntentService {
    /// Create empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every submission (widens race windows in tests)
    pub fn with_submit_delay(mut self, delay: Duration) -> Self {
        self.submit_delay = Some(delay);
        self
    }

    /// Make submissions fail
    pub fn set_fail_submit(&self, fail: bool) {
        self.fail_submit.store(fail, Ordering::Relaxed);
    }

    /// Make withdrawals fail
    pub fn set_fail_withdraw(&self, fail: bool) {
        self.fail_withdraw.store(fail, Ordering::Relaxed);
    }

    /// Successful submissions so far
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Purges so far
    pub fn purged(&self) -> u64 {
        self.purged.load(Ordering::Relaxed)
    }

    /// Intents not yet purged
    pub fn len(&self) -> usize {
        self.intents.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }

    /// State of an intent
    pub fn state(&self, id: IntentId) -> Option<IntentState> {
        self.intents.get(&id).map(|entry| entry.1)
    }

    /// Installed intents
    pub fn installed(&self) -> Vec<(IntentId, PathIntent)> {
        let mut out: Vec<_> = self
            .intents
            .iter()
            .filter(|entry| entry.1 == IntentState::Installed)
            .map(|entry| (*entry.key(), entry.0.clone()))
            .collect();
        out.sort_by_key(|(id, _)| *id);
        out
    }
}

#[async_trait]
impl IntentService for InMemoryIntentService {
    async fn submit(&self, intent: PathIntent) -> RoutingResult<IntentId> {
        if let Some(delay) = self.submit_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_submit.load(Ordering::Relaxed) {
            return Err(RoutingError::IntentService(format!(
                "submission rejected for {}",
                intent.key
            )));
        }

        let id = IntentId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.intents.insert(id, (intent, IntentState::Installed));
        self.submitted.fetch_add(1, Ordering::Relaxed);
        Ok(id)
    }

    async fn withdraw(&self, id: IntentId) -> RoutingResult<()> {
        if self.fail_withdraw.load(Ordering::Relaxed) {
            return Err(RoutingError::IntentService(format!("withdraw of {id} failed")));
        }
        let mut entry = self
            .intents
            .get_mut(&id)
            .ok_or_else(|| RoutingError::IntentService(format!("unknown intent {id}")))?;
        entry.1 = IntentState::Withdrawn;
        Ok(())
    }

    async fn purge(&self, id: IntentId) -> RoutingResult<()> {
        match self.intents.remove_if(&id, |_, entry| entry.1 == IntentState::Withdrawn) {
            Some(_) => {
                self.purged.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            None if self.intents.contains_key(&id) => Err(RoutingError::IntentService(
                format!("intent {id} must be withdrawn before purge"),
            )),
            None => Err(RoutingError::IntentService(format!("unknown intent {id}"))),
        }
    }
}
