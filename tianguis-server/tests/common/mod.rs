//! Shared fixtures for server integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};

use tianguis_core::config::SessionConfig;
use tianguis_core::persistence::{MemoryProfileRepository, ProfileRepository};
use tianguis_core::types::{AccountId, Message, Profile, ProfileSummary, ProgressRecord, Transcript};
use tianguis_core::{CoreError, ProgressStore, VendorCatalog};
use tianguis_llm::{GenerationBackend, GenerationClient, GenerationError, GenerationRequest, KeyRotationPool};
use tianguis_server::SessionOrchestrator;
use tianguis_server::orchestrator::PlayerTurn;

type Script = dyn Fn(&GenerationRequest, &str) -> Result<String, GenerationError> + Send + Sync;

/// Backend driven by a closure, recording every request and credential.
pub struct ScriptedBackend {
    script: Box<Script>,
    pub requests: Mutex<Vec<GenerationRequest>>,
    pub credentials: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new<F>(script: F) -> Arc<Self>
    where
        F: Fn(&GenerationRequest, &str) -> Result<String, GenerationError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            script: Box::new(script),
            requests: Mutex::new(Vec::new()),
            credentials: Mutex::new(Vec::new()),
        })
    }

    /// Always answers `text`.
    pub fn replying(text: &'static str) -> Arc<Self> {
        Self::new(move |_, _| Ok(text.to_string()))
    }

    /// Always fails with HTTP `status`.
    pub fn failing(status: u16) -> Arc<Self> {
        Self::new(move |_, _| Err(GenerationError::Status { status }))
    }

    pub fn calls(&self) -> usize {
        self.credentials.lock().len()
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn generate(
        &self,
        request: &GenerationRequest,
        credential: &SecretString,
    ) -> Result<String, GenerationError> {
        let key = credential.expose_secret().clone();
        self.requests.lock().push(request.clone());
        self.credentials.lock().push(key.clone());
        (self.script)(request, &key)
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Repository whose first `fail_writes` progress writes fail, and whose
/// writes each block the calling thread for `write_delay_ms`.
#[derive(Default)]
pub struct FlakyRepository {
    pub inner: MemoryProfileRepository,
    pub fail_writes: AtomicUsize,
    pub writes: AtomicUsize,
    pub write_delay_ms: AtomicU64,
}

impl ProfileRepository for FlakyRepository {
    fn create_profile(&self, display_name: &str) -> tianguis_core::error::Result<Profile> {
        self.inner.create_profile(display_name)
    }

    fn get_profile(&self, account: AccountId) -> tianguis_core::error::Result<Option<Profile>> {
        self.inner.get_profile(account)
    }

    fn update_progress(
        &self,
        account: AccountId,
        progress: &ProgressRecord,
    ) -> tianguis_core::error::Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let delay = self.write_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay));
        }
        if self.fail_writes.load(Ordering::SeqCst) > 0 {
            self.fail_writes.fetch_sub(1, Ordering::SeqCst);
            return Err(CoreError::Io(std::io::Error::other("database is locked")));
        }
        self.inner.update_progress(account, progress)
    }

    fn list_summaries(&self) -> tianguis_core::error::Result<Vec<ProfileSummary>> {
        self.inner.list_summaries()
    }
}

pub fn orchestrator(
    backend: Arc<ScriptedBackend>,
    keys: &[&str],
    repository: Arc<dyn ProfileRepository>,
) -> SessionOrchestrator {
    let generator = GenerationClient::new(
        backend,
        KeyRotationPool::new(keys.iter().copied()),
        Duration::from_secs(5),
    );
    SessionOrchestrator::new(
        Arc::new(VendorCatalog::builtin()),
        Arc::new(generator),
        Arc::new(ProgressStore::new(repository)),
        &SessionConfig::default(),
        3,
    )
}

pub fn memory_repository() -> Arc<MemoryProfileRepository> {
    Arc::new(MemoryProfileRepository::new())
}

/// A transcript for `completed` finished rounds.
pub fn transcript(opening: &str, completed: u32) -> Transcript {
    let mut history = vec![Message::vendor(opening)];
    for round in 1..=completed {
        history.push(Message::player(format!("Ronda {round}: ándale, regálame algo")));
        history.push(Message::vendor("Mmm... no sé."));
    }
    Transcript::from(history)
}

pub fn turn(vendor_id: &str, round_index: u32, round_target: u32) -> PlayerTurn {
    PlayerTurn {
        vendor_id: vendor_id.to_string(),
        history: transcript("¿Qué quieres?", round_index.saturating_sub(1)),
        player_message: "Es para mi abuelita, está enferma".to_string(),
        round_index,
        round_target,
    }
}
