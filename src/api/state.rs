use std::sync::Arc;

use tokio::sync::{RwLock, RwLockReadGuard};

use crate::api::ApiError;
use crate::platform::{CoreError, PlatformState};
use crate::storage::{save_state, StorageConfig};

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<StorageConfig>,
    pub platform: Arc<RwLock<PlatformState>>,
}

impl AppState {
    pub fn new(storage: StorageConfig, platform: PlatformState) -> Self {
        Self {
            storage: Arc::new(storage),
            platform: Arc::new(RwLock::new(platform)),
        }
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, PlatformState> {
        self.platform.read().await
    }

    /// Run a mutation under the exclusive lock and persist the result.
    ///
    /// The lock is held from the first read to the final write, so two
    /// requests against the same match are serialized. The operation runs
    /// on a copy that replaces the live state only once it is saved; a
    /// failed operation or a failed save leaves memory untouched.
    pub async fn mutate<T, F>(&self, op: F) -> Result<T, ApiError>
    where
        F: FnOnce(&mut PlatformState) -> Result<T, CoreError>,
    {
        let mut platform = self.platform.write().await;
        let mut next = platform.clone();
        let output = op(&mut next)?;
        save_state(&self.storage, &next)?;
        *platform = next;
        Ok(output)
    }
}
