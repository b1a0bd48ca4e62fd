//! Persistence adapter contracts.
//!
//! Engines never await a save. Each successful mutation hands a snapshot
//! to [`spawn_save`], which runs the write on the ambient tokio runtime and
//! logs any failure. Loads are awaited only by the `load_or_*` warm-start
//! helpers.
//!
//! [`InMemoryPersistence`] implements every contract and backs tests and
//! the demo binary.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use seedbed_types::{AllianceId, SeedId};
use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tracing::warn;

use crate::alliance::{Alliance, AllianceProposal};
use crate::error::PersistenceError;
use crate::mood::MoodSnapshot;
use crate::prompt_evolution::PromptEvolutionState;
use crate::trait_evolution::EvolutionState;

/// Storage for per-agent mood.
#[async_trait]
pub trait MoodPersistence: Send + Sync {
    /// Store the agent's mood snapshot.
    async fn save_mood_state(
        &self,
        seed_id: &SeedId,
        snapshot: &MoodSnapshot,
    ) -> Result<(), PersistenceError>;

    /// Fetch a previously stored snapshot.
    async fn load_mood_state(&self, seed_id: &SeedId)
    -> Result<Option<MoodSnapshot>, PersistenceError>;
}

/// Storage for per-agent trait evolution state.
#[async_trait]
pub trait EvolutionPersistence: Send + Sync {
    /// Store the agent's evolution state.
    async fn save_evolution_state(
        &self,
        seed_id: &SeedId,
        state: &EvolutionState,
    ) -> Result<(), PersistenceError>;

    /// Fetch previously stored evolution state.
    async fn load_evolution_state(
        &self,
        seed_id: &SeedId,
    ) -> Result<Option<EvolutionState>, PersistenceError>;
}

/// Storage for per-agent prompt evolution state.
#[async_trait]
pub trait PromptEvolutionPersistence: Send + Sync {
    /// Store the agent's adaptation state.
    async fn save_prompt_evolution_state(
        &self,
        seed_id: &SeedId,
        state: &PromptEvolutionState,
    ) -> Result<(), PersistenceError>;

    /// Fetch previously stored adaptation state.
    async fn load_prompt_evolution_state(
        &self,
        seed_id: &SeedId,
    ) -> Result<Option<PromptEvolutionState>, PersistenceError>;
}

/// Storage for alliances and proposals.
#[async_trait]
pub trait AlliancePersistence: Send + Sync {
    /// Store an alliance.
    async fn save_alliance(&self, alliance: &Alliance) -> Result<(), PersistenceError>;

    /// Store a proposal.
    async fn save_proposal(&self, proposal: &AllianceProposal) -> Result<(), PersistenceError>;

    /// All stored alliances.
    async fn load_alliances(&self) -> Result<Vec<Alliance>, PersistenceError>;

    /// All stored proposals.
    async fn load_proposals(&self) -> Result<Vec<AllianceProposal>, PersistenceError>;
}

// ---------------------------------------------------------------------------
// Fire-and-forget helper
// ---------------------------------------------------------------------------

/// Run `save` on the current tokio runtime without waiting for it.
///
/// Failures are logged at `warn`. Outside a runtime the save is skipped,
/// also at `warn`.
///
/// Saves are independent tasks. On a multi-thread runtime two saves of the
/// same key may complete out of order, leaving the store holding an older
/// snapshot than the engine until that key is saved again.
pub(crate) fn spawn_save<F>(kind: &'static str, key: String, save: F)
where
    F: Future<Output = Result<(), PersistenceError>> + Send + 'static,
{
    let Ok(handle) = Handle::try_current() else {
        warn!(kind, key = %key, "no tokio runtime, skipping persistence save");
        return;
    };
    handle.spawn(async move {
        if let Err(e) = save.await {
            warn!(kind, key = %key, error = %e, "persistence save failed");
        }
    });
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

/// Process-local store implementing every persistence contract.
#[derive(Debug, Default)]
pub struct InMemoryPersistence {
    moods: Mutex<BTreeMap<SeedId, MoodSnapshot>>,
    evolution: Mutex<BTreeMap<SeedId, EvolutionState>>,
    prompts: Mutex<BTreeMap<SeedId, PromptEvolutionState>>,
    alliances: Mutex<BTreeMap<AllianceId, Alliance>>,
    proposals: Mutex<BTreeMap<AllianceId, AllianceProposal>>,
    fail_writes: AtomicBool,
}

impl InMemoryPersistence {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent save fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), PersistenceError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PersistenceError::Backend(String::from("writes disabled")));
        }
        Ok(())
    }
}

#[async_trait]
impl MoodPersistence for InMemoryPersistence {
    async fn save_mood_state(
        &self,
        seed_id: &SeedId,
        snapshot: &MoodSnapshot,
    ) -> Result<(), PersistenceError> {
        self.check_writable()?;
        self.moods.lock().await.insert(seed_id.clone(), snapshot.clone());
        Ok(())
    }

    async fn load_mood_state(
        &self,
        seed_id: &SeedId,
    ) -> Result<Option<MoodSnapshot>, PersistenceError> {
        Ok(self.moods.lock().await.get(seed_id).cloned())
    }
}

#[async_trait]
impl EvolutionPersistence for InMemoryPersistence {
    async fn save_evolution_state(
        &self,
        seed_id: &SeedId,
        state: &EvolutionState,
    ) -> Result<(), PersistenceError> {
        self.check_writable()?;
        self.evolution.lock().await.insert(seed_id.clone(), state.clone());
        Ok(())
    }

    async fn load_evolution_state(
        &self,
        seed_id: &SeedId,
    ) -> Result<Option<EvolutionState>, PersistenceError> {
        Ok(self.evolution.lock().await.get(seed_id).cloned())
    }
}

#[async_trait]
impl PromptEvolutionPersistence for InMemoryPersistence {
    async fn save_prompt_evolution_state(
        &self,
        seed_id: &SeedId,
        state: &PromptEvolutionState,
    ) -> Result<(), PersistenceError> {
        self.check_writable()?;
        self.prompts.lock().await.insert(seed_id.clone(), state.clone());
        Ok(())
    }

    async fn load_prompt_evolution_state(
        &self,
        seed_id: &SeedId,
    ) -> Result<Option<PromptEvolutionState>, PersistenceError> {
        Ok(self.prompts.lock().await.get(seed_id).cloned())
    }
}

#[async_trait]
impl AlliancePersistence for InMemoryPersistence {
    async fn save_alliance(&self, alliance: &Alliance) -> Result<(), PersistenceError> {
        self.check_writable()?;
        self.alliances
            .lock()
            .await
            .insert(alliance.alliance_id, alliance.clone());
        Ok(())
    }

    async fn save_proposal(&self, proposal: &AllianceProposal) -> Result<(), PersistenceError> {
        self.check_writable()?;
        self.proposals
            .lock()
            .await
            .insert(proposal.alliance_id, proposal.clone());
        Ok(())
    }

    async fn load_alliances(&self) -> Result<Vec<Alliance>, PersistenceError> {
        Ok(self.alliances.lock().await.values().cloned().collect())
    }

    async fn load_proposals(&self) -> Result<Vec<AllianceProposal>, PersistenceError> {
        Ok(self.proposals.lock().await.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use seedbed_types::PadState;

    use super::*;

    fn snapshot() -> MoodSnapshot {
        MoodSnapshot {
            current: PadState::new(0.3, 0.1, 0.0),
            baseline: PadState::NEUTRAL,
            emotionality: 0.5,
        }
    }

    #[tokio::test]
    async fn round_trips_mood() {
        let store = InMemoryPersistence::new();
        let seed = SeedId::from("a");
        assert!(store.save_mood_state(&seed, &snapshot()).await.is_ok());
        let loaded = store.load_mood_state(&seed).await.ok().flatten();
        assert_eq!(loaded, Some(snapshot()));
    }

    #[tokio::test]
    async fn failing_writes_report_errors() {
        let store = InMemoryPersistence::new();
        store.set_fail_writes(true);
        let result = store.save_mood_state(&SeedId::from("a"), &snapshot()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn spawned_save_lands_eventually() {
        let store = Arc::new(InMemoryPersistence::new());
        let seed = SeedId::from("a");
        let writer = Arc::clone(&store);
        let key = seed.clone();
        spawn_save("mood", seed.to_string(), async move {
            writer.save_mood_state(&key, &snapshot()).await
        });
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(store.load_mood_state(&seed).await.ok().flatten().is_some());
    }

    #[test]
    fn spawn_without_runtime_is_skipped() {
        spawn_save("mood", String::from("a"), async { Ok(()) });
    }
}
