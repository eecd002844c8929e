//! Storage for flows that are waiting on their callback.
//!
//! Pending flows are keyed by their state value, so several flows can be in
//! flight at once and a callback can only ever consume its own entry.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Mutex,
    time::Duration,
};

use tracing::debug;

use crate::{error::OAuthError, types::PendingFlow};

/// File name used by [`FileFlowStore::in_dir`].
pub const FLOW_FILE_NAME: &str = "oauth2-state.json";

pub trait FlowStore: Send + Sync {
    /// Record a pending flow, replacing any entry with the same state.
    fn put(&self, flow: PendingFlow) -> Result<(), OAuthError>;

    /// Remove and return the flow for `state`. Other entries are untouched.
    fn take(&self, state: &str) -> Result<Option<PendingFlow>, OAuthError>;

    /// Drop flows older than `ttl`, returning how many were removed.
    fn remove_expired(&self, now_ms: u64, ttl: Duration) -> Result<usize, OAuthError>;

    fn pending(&self) -> Result<Vec<PendingFlow>, OAuthError>;
}

// ── In-memory ────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryFlowStore {
    flows: Mutex<HashMap<String, PendingFlow>>,
}

impl MemoryFlowStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_flows<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, PendingFlow>) -> T,
    ) -> Result<T, OAuthError> {
        let mut flows = self
            .flows
            .lock()
            .map_err(|_| OAuthError::Storage("pending flow lock poisoned".into()))?;
        Ok(f(&mut flows))
    }
}

impl FlowStore for MemoryFlowStore {
    fn put(&self, flow: PendingFlow) -> Result<(), OAuthError> {
        self.with_flows(|flows| {
            flows.insert(flow.state.clone(), flow);
        })
    }

    fn take(&self, state: &str) -> Result<Option<PendingFlow>, OAuthError> {
        self.with_flows(|flows| flows.remove(state))
    }

    fn remove_expired(&self, now_ms: u64, ttl: Duration) -> Result<usize, OAuthError> {
        self.with_flows(|flows| prune(flows, now_ms, ttl))
    }

    fn pending(&self) -> Result<Vec<PendingFlow>, OAuthError> {
        self.with_flows(|flows| flows.values().cloned().collect())
    }
}

// ── File-backed ──────────────────────────────────────────────────────────────

/// Pending flows persisted as a JSON map so a separate `callback` invocation
/// can verify a flow started by `connect`.
pub struct FileFlowStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileFlowStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(FLOW_FILE_NAME))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<HashMap<String, PendingFlow>, OAuthError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => {
                return Err(OAuthError::Storage(format!(
                    "failed to read {}: {e}",
                    self.path.display()
                )));
            },
        };
        if raw.trim().is_empty() {
            return Ok(HashMap::new());
        }
        serde_json::from_str(&raw).map_err(|e| {
            OAuthError::Storage(format!("corrupt flow file {}: {e}", self.path.display()))
        })
    }

    fn write(&self, flows: &HashMap<String, PendingFlow>) -> Result<(), OAuthError> {
        let storage_err =
            |e: std::io::Error| OAuthError::Storage(format!("{}: {e}", self.path.display()));

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(storage_err)?;
        }
        let body = serde_json::to_vec_pretty(flows)
            .map_err(|e| OAuthError::Storage(format!("failed to encode flows: {e}")))?;

        // Write-then-rename so a crash never leaves a half-written file.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, body).map_err(storage_err)?;
        restrict_permissions(&tmp).map_err(storage_err)?;
        std::fs::rename(&tmp, &self.path).map_err(storage_err)?;
        Ok(())
    }

    fn update<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, PendingFlow>) -> T,
    ) -> Result<T, OAuthError> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| OAuthError::Storage("flow file lock poisoned".into()))?;
        let mut flows = self.read()?;
        let before = flows.clone();
        let result = f(&mut flows);
        if flows != before {
            self.write(&flows)?;
        }
        Ok(result)
    }
}

impl FlowStore for FileFlowStore {
    fn put(&self, flow: PendingFlow) -> Result<(), OAuthError> {
        self.update(|flows| {
            flows.insert(flow.state.clone(), flow);
        })
    }

    fn take(&self, state: &str) -> Result<Option<PendingFlow>, OAuthError> {
        self.update(|flows| flows.remove(state))
    }

    fn remove_expired(&self, now_ms: u64, ttl: Duration) -> Result<usize, OAuthError> {
        self.update(|flows| prune(flows, now_ms, ttl))
    }

    fn pending(&self) -> Result<Vec<PendingFlow>, OAuthError> {
        Ok(self.read()?.into_values().collect())
    }
}

fn prune(flows: &mut HashMap<String, PendingFlow>, now_ms: u64, ttl: Duration) -> usize {
    let before = flows.len();
    flows.retain(|_, flow| !flow.is_expired(now_ms, ttl));
    let removed = before - flows.len();
    if removed > 0 {
        debug!(removed, "pruned expired OAuth flows");
    }
    removed
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
