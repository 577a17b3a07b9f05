use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, RwLock,
};

use tracing::info;

use crate::engine::{EngineConfig, TournamentEngine};
use crate::error::RegistryError;
use crate::types::*;

/// Live tournaments keyed by handle, for drivers that submit one result per request.
///
/// Each tournament sits behind its own `RwLock`: one submission at a time,
/// any number of concurrent readers. The table lock is only held to look up,
/// insert or remove an entry.
#[derive(Default)]
pub struct TournamentRegistry {
    config: EngineConfig,
    next_handle: AtomicU64,
    engines: RwLock<EngineTable>,
    observations: Mutex<Vec<MatchCountObservation>>,
}

impl TournamentRegistry {
    pub fn new(config: EngineConfig) -> Self {
        TournamentRegistry {
            config,
            ..Default::default()
        }
    }

    pub fn seed<I, S>(&self, labels: I) -> Result<TournamentHandle, RegistryError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut engine = TournamentEngine::new(self.config);
        engine.seed(labels)?;
        let handle = TournamentHandle(self.next_handle.fetch_add(1, Ordering::Relaxed) + 1);
        info!(%handle, real = engine.real_competitor_count(), "tournament registered");
        let mut table = self.engines.write().unwrap_or_else(|e| e.into_inner());
        table.insert(handle, Arc::new(RwLock::new(engine)));
        Ok(handle)
    }

    pub fn submit_result(
        &self,
        handle: TournamentHandle,
        match_id: MatchId,
        winner: CompetitorIndex,
    ) -> Result<RoundStatus, RegistryError> {
        let shared = self.lookup(handle)?;
        let mut engine = shared.write().unwrap_or_else(|e| e.into_inner());
        let status = engine.submit_result(match_id, winner)?;
        if status == RoundStatus::Completed {
            self.push_observation(&engine);
            info!(%handle, matches = engine.total_matches_played(), "tournament finished");
        }
        Ok(status)
    }

    pub fn current_match(&self, handle: TournamentHandle) -> Option<Match> {
        self.with_engine(handle, |engine| engine.current_match()).ok().flatten()
    }

    pub fn is_completed(&self, handle: TournamentHandle) -> bool {
        self.with_engine(handle, |engine| engine.is_completed()).unwrap_or(false)
    }

    pub fn total_matches_played(&self, handle: TournamentHandle) -> Option<usize> {
        self.with_engine(handle, |engine| engine.total_matches_played()).ok()
    }

    pub fn real_competitor_count(&self, handle: TournamentHandle) -> Option<usize> {
        self.with_engine(handle, |engine| engine.real_competitor_count()).ok()
    }

    pub fn standings(&self, handle: TournamentHandle) -> Result<Vec<Standing>, RegistryError> {
        self.with_engine(handle, |engine| engine.standings())
    }

    pub fn snapshot(&self, handle: TournamentHandle) -> Result<TournamentSnapshot, RegistryError> {
        self.with_engine(handle, |engine| engine.snapshot())
    }

    pub fn remove(&self, handle: TournamentHandle) -> Result<(), RegistryError> {
        let mut table = self.engines.write().unwrap_or_else(|e| e.into_inner());
        table
            .remove(&handle)
            .map(|_| ())
            .ok_or(RegistryError::UnknownHandle(handle))
    }

    pub fn len(&self) -> usize {
        self.engines.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Observations from tournaments completed since the last drain.
    pub fn drain_observations(&self) -> Vec<MatchCountObservation> {
        let mut guard = self.observations.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *guard)
    }

    /// Read-lock one tournament and call `f` with it.
    pub fn with_engine<F, R>(&self, handle: TournamentHandle, f: F) -> Result<R, RegistryError>
    where
        F: FnOnce(&TournamentEngine) -> R,
    {
        let shared = self.lookup(handle)?;
        let engine = shared.read().unwrap_or_else(|e| e.into_inner());
        Ok(f(&engine))
    }

    fn lookup(&self, handle: TournamentHandle) -> Result<SharedEngine, RegistryError> {
        let table = self.engines.read().unwrap_or_else(|e| e.into_inner());
        table
            .get(&handle)
            .cloned()
            .ok_or(RegistryError::UnknownHandle(handle))
    }

    fn push_observation(&self, engine: &TournamentEngine) {
        if let Some(observation) = engine.observation(RunOrigin::User) {
            let mut guard = self.observations.lock().unwrap_or_else(|e| e.into_inner());
            guard.push(observation);
        }
    }
}
