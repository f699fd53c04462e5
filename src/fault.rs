//! Fault Injection
//!
//! [`FaultyExecutor`] wraps another executor and fails commands at random
//! with [`Error::Connection`], the way a flaky link would. The random
//! stream comes from a seeded ChaCha8 generator, so a failing run can be
//! replayed with the same seed.

use crate::command::{Command, Condition};
use crate::error::{Error, Result};
use crate::executor::{ConnectionEvent, Executor};
use crate::resp::RespValue;
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Fault names.
pub mod faults {
    /// Fail before the command reaches the store (nothing is applied)
    pub const CONNECTION_RESET: &str = "connection.reset";
    /// Apply the command, then lose the reply
    pub const DROP_REPLY: &str = "connection.drop_reply";
}

/// Configuration for fault injection probabilities
#[derive(Debug, Clone)]
pub struct FaultConfig {
    /// Whether injection is enabled at all
    pub enabled: bool,
    /// Seed for the deterministic random stream
    pub seed: u64,
    /// Per-fault probabilities (0.0 to 1.0)
    pub probabilities: HashMap<&'static str, f64>,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self::disabled()
    }
}

impl FaultConfig {
    /// Enabled, with every fault at probability zero
    pub fn new(seed: u64) -> Self {
        FaultConfig {
            enabled: true,
            seed,
            probabilities: HashMap::new(),
        }
    }

    pub fn disabled() -> Self {
        FaultConfig {
            enabled: false,
            seed: 0,
            probabilities: HashMap::new(),
        }
    }

    /// Occasional failures
    pub fn flaky(seed: u64) -> Self {
        let mut config = Self::new(seed);
        config.set(faults::CONNECTION_RESET, 0.05);
        config.set(faults::DROP_REPLY, 0.02);
        config
    }

    /// Every command fails before reaching the store
    pub fn partitioned(seed: u64) -> Self {
        let mut config = Self::new(seed);
        config.set(faults::CONNECTION_RESET, 1.0);
        config
    }

    /// Set probability for a specific fault
    pub fn set(&mut self, fault_id: &'static str, probability: f64) -> &mut Self {
        self.probabilities.insert(fault_id, probability.clamp(0.0, 1.0));
        self
    }

    /// Get probability for a fault (0.0 if not set or disabled)
    pub fn get(&self, fault_id: &str) -> f64 {
        if !self.enabled {
            return 0.0;
        }
        self.probabilities.get(fault_id).copied().unwrap_or(0.0)
    }

    pub fn should_trigger(&self, fault_id: &str, random_value: f64) -> bool {
        random_value < self.get(fault_id)
    }
}

// ============================================================================
// FaultyExecutor
// ============================================================================

pub struct FaultyExecutor<E> {
    inner: E,
    config: Mutex<FaultConfig>,
    rng: Mutex<ChaCha8Rng>,
    injected: AtomicU64,
    failed: AtomicBool,
    events: broadcast::Sender<ConnectionEvent>,
}

impl<E: Executor> FaultyExecutor<E> {
    pub fn new(inner: E, config: FaultConfig) -> Self {
        let (events, _) = broadcast::channel(16);
        FaultyExecutor {
            inner,
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(config.seed)),
            config: Mutex::new(config),
            injected: AtomicU64::new(0),
            failed: AtomicBool::new(false),
            events,
        }
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    /// Number of faults injected so far.
    pub fn injected(&self) -> u64 {
        self.injected.load(Ordering::Relaxed)
    }

    /// Replaces the configuration; the random stream continues.
    pub fn set_config(&self, config: FaultConfig) {
        *self.config.lock() = config;
    }

    fn roll(&self, fault_id: &'static str) -> bool {
        let random_value: f64 = self.rng.lock().gen();
        let hit = self.config.lock().should_trigger(fault_id, random_value);
        if hit {
            self.injected.fetch_add(1, Ordering::Relaxed);
            debug!(fault = fault_id, "injecting fault");
        }
        hit
    }

    fn fail(&self, fault_id: &'static str) -> Error {
        let err = Error::Connection(format!("injected fault: {}", fault_id));
        if !self.failed.swap(true, Ordering::SeqCst) {
            warn!(fault = fault_id, "connection failed");
            let _ = self.events.send(ConnectionEvent::Failed {
                reason: err.to_string(),
            });
        }
        err
    }

    fn succeeded(&self) {
        if self.failed.swap(false, Ordering::SeqCst) {
            info!("connection restored");
            let _ = self.events.send(ConnectionEvent::Restored);
        }
    }

    /// Wraps one round trip with both fault points.
    async fn guarded<T, F>(&self, round_trip: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        if self.roll(faults::CONNECTION_RESET) {
            return Err(self.fail(faults::CONNECTION_RESET));
        }
        let result = round_trip.await?;
        if self.roll(faults::DROP_REPLY) {
            return Err(self.fail(faults::DROP_REPLY));
        }
        self.succeeded();
        Ok(result)
    }
}

#[async_trait]
impl<E: Executor> Executor for FaultyExecutor<E> {
    async fn execute(&self, cmd: Command) -> Result<RespValue> {
        self.guarded(self.inner.execute(cmd)).await
    }

    async fn pipeline(&self, cmds: Vec<Command>) -> Result<Vec<Result<RespValue>>> {
        self.guarded(self.inner.pipeline(cmds)).await
    }

    async fn transaction(
        &self,
        conditions: Vec<Condition>,
        cmds: Vec<Command>,
    ) -> Result<Option<Vec<Result<RespValue>>>> {
        self.guarded(self.inner.transaction(conditions, cmds)).await
    }

    fn is_connected(&self) -> bool {
        !self.failed.load(Ordering::SeqCst) && self.inner.is_connected()
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<ConnectionEvent>> {
        Some(self.events.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    #[test]
    fn test_disabled_config_never_triggers() {
        let mut config = FaultConfig::disabled();
        config.set(faults::CONNECTION_RESET, 1.0);
        assert_eq!(config.get(faults::CONNECTION_RESET), 0.0);
        assert!(!config.should_trigger(faults::CONNECTION_RESET, 0.0));
    }

    #[test]
    fn test_probabilities_are_clamped() {
        let mut config = FaultConfig::new(1);
        config.set(faults::DROP_REPLY, 7.0);
        assert_eq!(config.get(faults::DROP_REPLY), 1.0);
        assert_eq!(config.get("unknown"), 0.0);
    }

    #[tokio::test]
    async fn test_reset_never_reaches_store() {
        let faulty = FaultyExecutor::new(MemoryStore::new(), FaultConfig::partitioned(7));
        let err = faulty
            .execute(Command::new("SET").arg("k").arg("v"))
            .await
            .unwrap_err();
        assert!(err.is_connection());
        assert!(faulty.inner().is_empty());
        assert_eq!(faulty.injected(), 1);
        assert!(!faulty.is_connected());
    }

    #[tokio::test]
    async fn test_dropped_reply_still_applies() {
        let mut config = FaultConfig::new(7);
        config.set(faults::DROP_REPLY, 1.0);
        let faulty = FaultyExecutor::new(MemoryStore::new(), config);
        assert!(faulty.execute(Command::new("SET").arg("k").arg("v")).await.is_err());
        assert_eq!(faulty.inner().len(), 1);
    }

    #[tokio::test]
    async fn test_same_seed_same_faults() {
        async fn outcomes(seed: u64) -> Vec<bool> {
            let faulty = FaultyExecutor::new(MemoryStore::new(), FaultConfig::flaky(seed));
            let mut out = Vec::new();
            for _ in 0..200 {
                out.push(faulty.execute(Command::new("PING")).await.is_ok());
            }
            out
        }
        assert_eq!(outcomes(42).await, outcomes(42).await);
    }

    #[tokio::test]
    async fn test_events_on_failure_and_recovery() {
        let faulty = FaultyExecutor::new(MemoryStore::new(), FaultConfig::partitioned(1));
        let mut events = faulty.subscribe().unwrap();
        let _ = faulty.execute(Command::new("PING")).await;
        let _ = faulty.execute(Command::new("PING")).await;
        faulty.set_config(FaultConfig::disabled());
        faulty.execute(Command::new("PING")).await.unwrap();
        assert!(matches!(events.try_recv(), Ok(ConnectionEvent::Failed { .. })));
        assert_eq!(events.try_recv(), Ok(ConnectionEvent::Restored));
        assert!(events.try_recv().is_err());
    }
}
