//! Runs generation calls for the three slots against the session store

use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::asset::file::FileHandler;
use crate::backend::traits::{GeneratedImage, ImageGenerator};
use crate::error::{AppError, Result};
use crate::session::state::{SessionState, Slot, Ticket};
use crate::session::store::{Action, Completion, Effect, SessionStore};

/// Clears the slot's busy flag if the call never reports back
struct SlotGuard {
    store: Arc<Mutex<SessionStore>>,
    ticket: Ticket,
    finished: bool,
}

impl SlotGuard {
    fn new(store: Arc<Mutex<SessionStore>>, ticket: Ticket) -> Self {
        Self {
            store,
            ticket,
            finished: false,
        }
    }

    fn finish(mut self, outcome: std::result::Result<GeneratedImage, String>) -> Completion {
        self.finished = true;
        self.store.lock().finish(self.ticket, outcome)
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        if !self.finished {
            self.store.lock().abandon(self.ticket);
        }
    }
}

/// Coordinates the character, background and main generations
#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<Mutex<SessionStore>>,
    generator: Arc<dyn ImageGenerator>,
    counters: Arc<Counters>,
}

#[derive(Default)]
struct Counters {
    started: AtomicU64,
    applied: AtomicU64,
    failed: AtomicU64,
    stale: AtomicU64,
}

impl Orchestrator {
    /// Create an orchestrator owning the store
    pub fn new(store: SessionStore, generator: Arc<dyn ImageGenerator>) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            generator,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Snapshot of the current session state
    pub fn state(&self) -> SessionState {
        self.store.lock().state().clone()
    }

    /// Read the session state without cloning it
    pub fn with_state<R>(&self, f: impl FnOnce(&SessionState) -> R) -> R {
        f(self.store.lock().state())
    }

    /// Apply a user action
    pub fn dispatch(&self, action: Action) -> Result<()> {
        self.store.lock().dispatch(action)
    }

    /// Run one generation for `slot` to completion.
    ///
    /// Returns `Completion::Stale` when the slot was invalidated while the call
    /// ran. Errors are also recorded in the session's error slot.
    pub async fn generate(&self, slot: Slot) -> Result<Completion> {
        let effect = {
            let mut store = self.store.lock();
            store.begin(slot)?
        };
        let Effect::Call { ticket, request } = effect;
        let guard = SlotGuard::new(self.store.clone(), ticket);
        self.counters.started.fetch_add(1, Ordering::Relaxed);

        debug!(
            slot = %slot,
            generator = %self.generator.name(),
            operation = ?request.operation(),
            "Calling generation service"
        );

        let result = request.execute(self.generator.as_ref()).await;

        match result {
            Ok(image) => {
                let completion = guard.finish(Ok(image));
                self.count(&completion);
                Ok(completion)
            }
            Err(e) => {
                let completion = guard.finish(Err(e.to_string()));
                self.count(&completion);
                match completion {
                    Completion::Stale => Ok(completion),
                    _ => Err(e),
                }
            }
        }
    }

    pub async fn generate_character(&self) -> Result<Completion> {
        self.generate(Slot::Character).await
    }

    pub async fn generate_background(&self) -> Result<Completion> {
        self.generate(Slot::Background).await
    }

    /// Pose transfer or edit, depending on the selected pose
    pub async fn generate_main(&self) -> Result<Completion> {
        self.generate(Slot::Main).await
    }

    /// Run a generation on its own task so other slots can proceed
    pub fn spawn(&self, slot: Slot) -> JoinHandle<Result<Completion>> {
        let this = self.clone();
        tokio::spawn(async move { this.generate(slot).await })
    }

    /// Write the generated output to the download directory
    pub async fn download_output(&self, files: &FileHandler) -> Result<PathBuf> {
        let output = self.with_state(|s| s.output().cloned());
        let result = async {
            let output = output.ok_or_else(|| {
                AppError::Validation("There is no generated image to download.".to_string())
            })?;
            let payload = output.to_local_payload()?.ok_or_else(|| {
                AppError::Decode("Generated image is not held locally".to_string())
            })?;
            files.save_payload(&payload, "character").await
        }
        .await;

        match result {
            Ok(path) => {
                info!(path = ?path, "Downloaded generated image");
                Ok(path)
            }
            Err(e) => {
                self.store.lock().record_error(e.to_string());
                Err(e)
            }
        }
    }

    /// Counters of generation outcomes since startup
    pub fn stats(&self) -> OrchestratorStats {
        OrchestratorStats {
            started: self.counters.started.load(Ordering::Relaxed),
            applied: self.counters.applied.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            stale: self.counters.stale.load(Ordering::Relaxed),
        }
    }

    fn count(&self, completion: &Completion) {
        let counter = match completion {
            Completion::Applied(_) => &self.counters.applied,
            Completion::Failed => &self.counters.failed,
            Completion::Stale => &self.counters.stale,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Generation statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorStats {
    pub started: u64,
    pub applied: u64,
    pub failed: u64,
    pub stale: u64,
}
