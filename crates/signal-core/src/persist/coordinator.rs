use crate::config::GameConfig;
use crate::persist::local::LocalStore;
use crate::persist::remote::{Identity, RemoteError, RemoteRow, RemoteStore, RemoteWrite};
use crate::save::{sanitize, sanitize_str, to_storage_string, to_storage_value, SaveState};

/// Which copy won a sign-in reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveSource {
    Local,
    Remote,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub source: SaveSource,
    pub state: SaveState,
}

/// Outcome of the sign-in decision, before anything is sent.
#[derive(Debug, Clone, PartialEq)]
pub struct SignInResolution {
    pub reconciled: Reconciled,
    /// Forced write that pushes a winning local copy to the remote row.
    pub seed: Option<RemoteWrite>,
}

/// Recency of a remote row: the timestamp embedded in the state blob, or the
/// row column when the blob carries none.
pub fn remote_timestamp(row: &RemoteRow) -> u64 {
    let embedded = sanitize(&row.state).meta.updated_at_ms;
    if embedded > 0 {
        embedded
    } else {
        row.updated_at_ms.unwrap_or(0)
    }
}

/// Owns both storage backends and the remote-write throttle.
///
/// The save itself is always owned by the caller and passed in; the only
/// state kept across calls is the identity and the throttle stamp.
pub struct Coordinator<L, R> {
    local: L,
    remote: R,
    storage_key: String,
    throttle_ms: u64,
    identity: Option<Identity>,
    /// Process-local; a reload starts a fresh throttle window.
    last_cloud_write_ms: Option<u64>,
}

impl<L: LocalStore, R: RemoteStore> Coordinator<L, R> {
    pub fn new(local: L, remote: R, config: &GameConfig) -> Self {
        Self {
            local,
            remote,
            storage_key: config.storage_key.clone(),
            throttle_ms: config.remote_write_throttle_ms,
            identity: None,
            last_cloud_write_ms: None,
        }
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn local(&self) -> &L {
        &self.local
    }

    // -- Identity --

    pub fn sign_in(&mut self, identity: Identity) {
        log::info!("persist: signed in as {}", identity.user_id);
        self.identity = Some(identity);
        self.last_cloud_write_ms = None;
    }

    pub fn sign_out(&mut self) {
        if let Some(identity) = self.identity.take() {
            log::info!("persist: signed out {}", identity.user_id);
        }
        self.last_cloud_write_ms = None;
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    // -- Local cache --

    /// Write the storage form of `state` to the local cache. Never fails
    /// outward; returns whether the write landed.
    pub fn save_local(&mut self, state: &SaveState) -> bool {
        let text = match to_storage_string(state) {
            Ok(text) => text,
            Err(e) => {
                log::warn!("persist: could not serialize save: {}", e);
                return false;
            }
        };
        match self.local.set(&self.storage_key, &text) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("persist: local save failed: {}", e);
                false
            }
        }
    }

    /// The sanitized local copy, or `None` when absent or unparseable.
    pub fn load_local(&self) -> Option<SaveState> {
        let text = self.local.get(&self.storage_key)?;
        sanitize_str(&text)
    }

    pub fn has_local(&self) -> bool {
        self.load_local().is_some()
    }

    pub fn wipe_local(&mut self) {
        self.local.remove(&self.storage_key);
        log::info!("persist: local save wiped");
    }

    // -- Remote row --

    /// Synchronous half of a remote save: checks identity and throttle,
    /// stamps the state and builds the payload. `None` means skip.
    ///
    /// The throttle window restarts on every write this returns, forced or not.
    pub fn prepare_remote_write(&mut self, state: &mut SaveState, force: bool, now_ms: u64) -> Option<RemoteWrite> {
        let user_id = self.identity.as_ref()?.user_id.clone();
        if !force {
            if let Some(last) = self.last_cloud_write_ms {
                if now_ms.saturating_sub(last) < self.throttle_ms {
                    log::debug!("persist: remote write throttled");
                    return None;
                }
            }
        }
        self.last_cloud_write_ms = Some(now_ms);

        state.meta.updated_at_ms = now_ms;
        state.meta.last_cloud_write_ms = now_ms;
        match to_storage_value(state) {
            Ok(value) => Some(RemoteWrite {
                user_id,
                state: value,
                updated_at_ms: now_ms,
                forced: force,
            }),
            Err(e) => {
                log::warn!("persist: could not serialize save for remote: {}", e);
                None
            }
        }
    }

    /// Upsert `state` to the remote row. `Ok(false)` when signed out or throttled.
    pub async fn save_remote(&mut self, state: &mut SaveState, force: bool, now_ms: u64) -> Result<bool, RemoteError> {
        let Some(write) = self.prepare_remote_write(state, force, now_ms) else {
            return Ok(false);
        };
        self.remote.upsert(&write).await?;
        Ok(true)
    }

    /// The sanitized remote copy. `Ok(None)` when signed out or no row exists.
    pub async fn load_remote(&self) -> Result<Option<SaveState>, RemoteError> {
        let Some(identity) = &self.identity else {
            return Ok(None);
        };
        let row = self.remote.fetch(&identity.user_id).await?;
        Ok(row.map(|r| sanitize(&r.state)))
    }

    pub async fn wipe_remote(&mut self) -> Result<(), RemoteError> {
        let Some(identity) = &self.identity else {
            return Err(RemoteError::Unauthenticated);
        };
        self.remote.delete(&identity.user_id).await?;
        log::info!("persist: remote save wiped");
        Ok(())
    }

    // -- Reconciliation --

    /// Decide between the device's copy and the fetched row.
    ///
    /// `local` is `None` when this device has no local cache. A device
    /// without a cache always adopts an existing row. When both exist the
    /// strictly newer one wins whole; ties go to the remote. The winner is
    /// written to the local cache before this returns.
    pub fn resolve_sign_in(&mut self, local: Option<SaveState>, row: Option<RemoteRow>, now_ms: u64) -> SignInResolution {
        let (source, mut state, push_local) = match (local, row) {
            (None, None) => {
                log::info!("reconcile: no local or remote save, starting fresh");
                (SaveSource::Local, SaveState::default(), false)
            }
            (Some(local), None) => {
                log::info!("reconcile: no remote row, seeding it from local");
                (SaveSource::Local, local, true)
            }
            (None, Some(row)) => {
                log::info!("reconcile: fresh device, adopting remote save");
                (SaveSource::Remote, sanitize(&row.state), false)
            }
            (Some(local), Some(row)) => {
                let local_ts = local.meta.updated_at_ms;
                let remote_ts = remote_timestamp(&row);
                if local_ts > remote_ts {
                    log::info!("reconcile: local is newer ({} > {}), pushing it", local_ts, remote_ts);
                    (SaveSource::Local, local, true)
                } else {
                    log::info!("reconcile: remote is newer or equal ({} <= {}), adopting it", local_ts, remote_ts);
                    (SaveSource::Remote, sanitize(&row.state), false)
                }
            }
        };

        let seed = if push_local {
            self.prepare_remote_write(&mut state, true, now_ms)
        } else {
            None
        };
        self.save_local(&state);

        SignInResolution {
            reconciled: Reconciled { source, state },
            seed,
        }
    }

    /// Fetch, decide and seed in one call. Only the fetch failure is
    /// returned; a failed seed write is logged and left to the next save.
    pub async fn reconcile_on_sign_in(&mut self, local: Option<SaveState>, now_ms: u64) -> Result<Reconciled, RemoteError> {
        let Some(identity) = &self.identity else {
            return Ok(Reconciled {
                source: SaveSource::Local,
                state: local.unwrap_or_default(),
            });
        };
        let row = self.remote.fetch(&identity.user_id).await?;
        let resolution = self.resolve_sign_in(local, row, now_ms);
        if let Some(seed) = &resolution.seed {
            if let Err(e) = self.remote.upsert(seed).await {
                log::warn!("reconcile: seeding remote failed: {}", e);
            }
        }
        Ok(resolution.reconciled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::local::MemoryStore;
    use crate::persist::remote::MemoryRemote;
    use pollster::block_on;
    use serde_json::json;

    const USER: &str = "user-1";
    const SECOND: u64 = 1000;

    fn coordinator() -> (Coordinator<MemoryStore, MemoryRemote>, MemoryStore, MemoryRemote) {
        let local = MemoryStore::new();
        let remote = MemoryRemote::new();
        let coord = Coordinator::new(local.clone(), remote.clone(), &GameConfig::default());
        (coord, local, remote)
    }

    fn signed_in() -> (Coordinator<MemoryStore, MemoryRemote>, MemoryStore, MemoryRemote) {
        let (mut coord, local, remote) = coordinator();
        coord.sign_in(Identity::new(USER));
        (coord, local, remote)
    }

    fn state_with(total: f64, updated_at_ms: u64) -> SaveState {
        let mut s = SaveState::default();
        s.total = total;
        s.signal = total;
        s.sync_phase();
        s.meta.updated_at_ms = updated_at_ms;
        s
    }

    fn row_from(state: &SaveState, column_ms: Option<u64>) -> RemoteRow {
        RemoteRow {
            user_id: USER.to_string(),
            state: to_storage_value(state).unwrap(),
            updated_at_ms: column_ms,
        }
    }

    // -- Local --

    #[test]
    fn local_round_trip() {
        let (mut coord, _, _) = coordinator();
        assert!(coord.load_local().is_none());
        let s = state_with(42.0, 7);
        assert!(coord.save_local(&s));
        assert_eq!(coord.load_local(), Some(s));
        coord.wipe_local();
        assert!(!coord.has_local());
    }

    #[test]
    fn local_write_failure_is_swallowed() {
        let (mut coord, local, _) = coordinator();
        local.set_fail_writes(true);
        assert!(!coord.save_local(&state_with(1.0, 1)));
        assert!(coord.load_local().is_none());
    }

    #[test]
    fn corrupt_local_cache_reads_as_absent() {
        let (coord, mut local, _) = coordinator();
        local.set("signal.save", "{{{").unwrap();
        assert!(coord.load_local().is_none());
    }

    #[test]
    fn local_cache_never_holds_transient_keys() {
        let (mut coord, local, _) = coordinator();
        let mut s = state_with(1.0, 1);
        s.mark_dirty();
        coord.save_local(&s);
        let text = local.get("signal.save").unwrap();
        assert!(!text.contains("_dirty"));
    }

    // -- Remote writes --

    #[test]
    fn guest_remote_save_is_a_no_op() {
        let (mut coord, _, remote) = coordinator();
        let mut s = state_with(1.0, 1);
        assert_eq!(block_on(coord.save_remote(&mut s, true, 10 * SECOND)), Ok(false));
        assert_eq!(remote.writes(), 0);
    }

    #[test]
    fn opportunistic_writes_are_throttled() {
        let (mut coord, _, remote) = signed_in();
        let mut s = state_with(1.0, 1);
        assert_eq!(block_on(coord.save_remote(&mut s, false, 100 * SECOND)), Ok(true));
        assert_eq!(block_on(coord.save_remote(&mut s, false, 130 * SECOND)), Ok(false));
        assert_eq!(remote.writes(), 1);
        assert_eq!(block_on(coord.save_remote(&mut s, false, 145 * SECOND)), Ok(true));
        assert_eq!(remote.writes(), 2);
    }

    #[test]
    fn forced_write_bypasses_and_resets_throttle() {
        let (mut coord, _, remote) = signed_in();
        let mut s = state_with(1.0, 1);
        block_on(coord.save_remote(&mut s, false, 100 * SECOND)).unwrap();
        assert_eq!(block_on(coord.save_remote(&mut s, true, 110 * SECOND)), Ok(true));
        assert_eq!(remote.writes(), 2);
        // Window now runs from the forced write.
        assert_eq!(block_on(coord.save_remote(&mut s, false, 150 * SECOND)), Ok(false));
        assert_eq!(block_on(coord.save_remote(&mut s, false, 155 * SECOND)), Ok(true));
        assert_eq!(remote.writes(), 3);
    }

    #[test]
    fn remote_write_stamps_and_strips() {
        let (mut coord, _, remote) = signed_in();
        let mut s = state_with(5.0, 1);
        s.mark_dirty();
        block_on(coord.save_remote(&mut s, true, 77 * SECOND)).unwrap();
        assert_eq!(s.meta.updated_at_ms, 77 * SECOND);
        assert_eq!(s.meta.last_cloud_write_ms, 77 * SECOND);
        let row = remote.row(USER).unwrap();
        assert!(row.state["meta"].get("_dirty").is_none());
        assert_eq!(row.state["meta"]["updatedAtMs"], json!(77 * SECOND));
    }

    #[test]
    fn remote_failure_propagates() {
        let (mut coord, _, remote) = signed_in();
        remote.set_offline(true);
        let mut s = state_with(1.0, 1);
        assert!(matches!(
            block_on(coord.save_remote(&mut s, true, SECOND)),
            Err(RemoteError::Transport(_))
        ));
        assert!(block_on(coord.load_remote()).is_err());
    }

    #[test]
    fn load_remote_sanitizes() {
        let (coord, _, remote) = signed_in();
        remote.insert_row(RemoteRow {
            user_id: USER.to_string(),
            state: json!({ "total": 600, "corruption": 9, "bogus": true }),
            updated_at_ms: None,
        });
        let s = block_on(coord.load_remote()).unwrap().unwrap();
        assert_eq!(s.total, 600.0);
        assert_eq!(s.phase, 2);
        assert_eq!(s.corruption, 1.0);
    }

    #[test]
    fn wipe_remote_needs_identity() {
        let (mut coord, _, remote) = coordinator();
        assert_eq!(block_on(coord.wipe_remote()), Err(RemoteError::Unauthenticated));
        coord.sign_in(Identity::new(USER));
        remote.insert_row(row_from(&state_with(1.0, 1), None));
        block_on(coord.wipe_remote()).unwrap();
        assert!(remote.row(USER).is_none());
    }

    // -- Reconciliation --

    #[test]
    fn guest_reconcile_returns_local_unchanged() {
        let (mut coord, _, remote) = coordinator();
        let local = state_with(33.0, 5);
        let r = block_on(coord.reconcile_on_sign_in(Some(local.clone()), SECOND)).unwrap();
        assert_eq!(r.source, SaveSource::Local);
        assert_eq!(r.state, local);
        assert_eq!(remote.writes(), 0);
    }

    #[test]
    fn fresh_device_adopts_remote_wholesale() {
        let (mut coord, _, remote) = signed_in();
        remote.insert_row(row_from(&state_with(500.0, 2000), None));
        let r = block_on(coord.reconcile_on_sign_in(None, 10 * SECOND)).unwrap();
        assert_eq!(r.source, SaveSource::Remote);
        assert_eq!(r.state.total, 500.0);
        assert_eq!(r.state.phase, 2);
        assert_eq!(coord.load_local().unwrap().total, 500.0);
        assert_eq!(remote.writes(), 0);
    }

    #[test]
    fn newer_remote_wins() {
        let (mut coord, _, remote) = signed_in();
        remote.insert_row(row_from(&state_with(900.0, 2000), None));
        let r = block_on(coord.reconcile_on_sign_in(Some(state_with(10.0, 1000)), 10 * SECOND)).unwrap();
        assert_eq!(r.source, SaveSource::Remote);
        assert_eq!(r.state.total, 900.0);
        assert_eq!(coord.load_local().unwrap().total, 900.0);
        assert_eq!(remote.writes(), 0);
    }

    #[test]
    fn newer_local_wins_and_is_pushed() {
        let (mut coord, _, remote) = signed_in();
        remote.insert_row(row_from(&state_with(900.0, 1000), None));
        let r = block_on(coord.reconcile_on_sign_in(Some(state_with(10.0, 2000)), 10 * SECOND)).unwrap();
        assert_eq!(r.source, SaveSource::Local);
        assert_eq!(r.state.total, 10.0);
        assert_eq!(remote.writes(), 1);
        let pushed = sanitize(&remote.row(USER).unwrap().state);
        assert_eq!(pushed.total, 10.0);
        assert_eq!(coord.load_local().unwrap().total, 10.0);
    }

    #[test]
    fn ties_go_to_remote() {
        let (mut coord, _, remote) = signed_in();
        remote.insert_row(row_from(&state_with(900.0, 1500), None));
        let r = block_on(coord.reconcile_on_sign_in(Some(state_with(10.0, 1500)), 10 * SECOND)).unwrap();
        assert_eq!(r.source, SaveSource::Remote);
        assert_eq!(remote.writes(), 0);
    }

    #[test]
    fn nothing_anywhere_starts_fresh_without_writing_remote() {
        let (mut coord, _, remote) = signed_in();
        let r = block_on(coord.reconcile_on_sign_in(None, 10 * SECOND)).unwrap();
        assert_eq!(r.state, SaveState::default());
        assert_eq!(remote.writes(), 0);
        assert!(remote.row(USER).is_none());
    }

    #[test]
    fn missing_row_is_seeded_from_local() {
        let (mut coord, _, remote) = signed_in();
        let r = block_on(coord.reconcile_on_sign_in(Some(state_with(77.0, 3000)), 10 * SECOND)).unwrap();
        assert_eq!(r.source, SaveSource::Local);
        assert_eq!(remote.writes(), 1);
        assert_eq!(sanitize(&remote.row(USER).unwrap().state).total, 77.0);
    }

    #[test]
    fn embedded_timestamp_beats_column() {
        let remote_state = state_with(900.0, 1000);
        let row = row_from(&remote_state, Some(5000));
        assert_eq!(remote_timestamp(&row), 1000);

        let (mut coord, _, remote) = signed_in();
        remote.insert_row(row);
        let r = block_on(coord.reconcile_on_sign_in(Some(state_with(10.0, 2000)), 10 * SECOND)).unwrap();
        assert_eq!(r.source, SaveSource::Local);
    }

    #[test]
    fn column_timestamp_is_the_fallback() {
        let row = RemoteRow {
            user_id: USER.to_string(),
            state: json!({ "total": 900 }),
            updated_at_ms: Some(5000),
        };
        assert_eq!(remote_timestamp(&row), 5000);
    }

    #[test]
    fn fetch_failure_surfaces() {
        let (mut coord, _, remote) = signed_in();
        remote.set_offline(true);
        let r = block_on(coord.reconcile_on_sign_in(Some(state_with(10.0, 2000)), 10 * SECOND));
        assert!(matches!(r, Err(RemoteError::Transport(_))));
    }
}
