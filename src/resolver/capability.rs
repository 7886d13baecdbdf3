use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;

/// How a path is turned into something the display can load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Synchronous path -> file URI conversion
    Direct,
    /// Read the bytes through the bridge and embed them as a data URI
    Base64,
}

/// Observable state of the capability probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    Unprobed,
    Probing,
    Capable,
    Fallback,
}

/// Holds the one-time verdict of the capability probe.
///
/// The verdict is a property of the environment the process runs in, so it
/// is computed once and never re-evaluated for the lifetime of the context. Concurrent callers that arrive while the probe runs
/// await the same in-flight probe.
#[derive(Debug, Default)]
pub struct CapabilityContext {
    verdict: Mutex<Arc<OnceCell<Strategy>>>,
    probing: AtomicBool,
    probes_started: AtomicUsize,
}

impl CapabilityContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ProbeState {
        match self.cell().get() {
            Some(Strategy::Direct) => ProbeState::Capable,
            Some(Strategy::Base64) => ProbeState::Fallback,
            None if self.probing.load(Ordering::SeqCst) => ProbeState::Probing,
            None => ProbeState::Unprobed,
        }
    }

    /// The cached strategy, if the probe has finished
    #[cfg(test)]
    pub fn strategy(&self) -> Option<Strategy> {
        self.cell().get().copied()
    }

    /// Return the cached strategy, running `probe` first if no verdict exists.
    /// Only the first caller's probe runs; everyone else waits for its result.
    pub async fn get_or_probe<F, Fut>(&self, probe: F) -> Strategy
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Strategy>,
    {
        let cell = self.cell();
        let strategy = cell
            .get_or_init(|| async move {
                self.probing.store(true, Ordering::SeqCst);
                self.probes_started.fetch_add(1, Ordering::SeqCst);
                let strategy = probe().await;
                self.probing.store(false, Ordering::SeqCst);
                strategy
            })
            .await;
        *strategy
    }

    /// Forget the verdict; the next resolution probes again
    #[cfg(test)]
    pub fn reset(&self) {
        let mut verdict = self.verdict.lock().unwrap_or_else(PoisonError::into_inner);
        *verdict = Arc::new(OnceCell::new());
        self.probing.store(false, Ordering::SeqCst);
        log::info!("Capability verdict reset");
    }

    /// How many probes were started since creation
    #[cfg(test)]
    pub fn probes_started(&self) -> usize {
        self.probes_started.load(Ordering::SeqCst)
    }

    fn cell(&self) -> Arc<OnceCell<Strategy>> {
        let verdict = self.verdict.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&verdict)
    }
}
