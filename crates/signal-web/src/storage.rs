use signal_core::{LocalError, LocalStore, MemoryStore};
use web_sys::Storage;

/// `window.localStorage`, or an in-memory map when the browser refuses
/// storage (private mode, disabled cookies). Progress then lasts the session.
pub struct WebStorage {
    storage: Option<Storage>,
    fallback: MemoryStore,
}

impl WebStorage {
    pub fn new() -> Self {
        let storage = web_sys::window().and_then(|w| w.local_storage().ok().flatten());
        if storage.is_none() {
            log::warn!("localStorage unavailable, progress will not survive a reload");
        }
        Self {
            storage,
            fallback: MemoryStore::new(),
        }
    }
}

impl Default for WebStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalStore for WebStorage {
    fn get(&self, key: &str) -> Option<String> {
        match &self.storage {
            Some(storage) => storage.get_item(key).ok().flatten(),
            None => self.fallback.get(key),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), LocalError> {
        match &self.storage {
            Some(storage) => storage
                .set_item(key, value)
                .map_err(|e| LocalError::Write(format!("{:?}", e))),
            None => self.fallback.set(key, value),
        }
    }

    fn remove(&mut self, key: &str) {
        match &self.storage {
            Some(storage) => {
                if let Err(e) = storage.remove_item(key) {
                    log::warn!("localStorage remove failed: {:?}", e);
                }
            }
            None => self.fallback.remove(key),
        }
    }
}
