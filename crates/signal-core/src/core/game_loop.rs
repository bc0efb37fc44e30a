use crate::api::types::{EventKind, GameEvent};
use crate::bridge::protocol::{HudSnapshot, SyncMode};
use crate::comms::{ai_ready, ambient_ready, CommsLine, CommsRequest, CommsStatus};
use crate::config::GameConfig;
use crate::core::time::{clamp_frame_dt, FixedTimestep};
use crate::economy::formulas::{self, recompute, Derived};
use crate::input::queue::{GameInput, InputQueue};
use crate::offline::{offline_report, OfflineReport};
use crate::persist::{Coordinator, Identity, LocalStore, RemoteError, RemoteRow, RemoteStore, RemoteWrite, SaveSource};
use crate::save::{normalize_name, SaveState};

/// What the host must do after a tick.
#[derive(Debug, Default)]
pub struct TickReport {
    /// The slow cadence fired: refresh the HUD.
    pub hud_due: bool,
    /// Remote writes to ship, oldest first.
    pub remote_writes: Vec<RemoteWrite>,
    /// A comms call to make.
    pub comms: Option<CommsRequest>,
}

/// Speaker hint sent with comms calls, by phase.
const SPEAKERS: [&str; 6] = ["operator", "operator", "relay", "echo", "choir", "void"];

fn speaker_for_phase(phase: u8) -> &'static str {
    SPEAKERS[usize::from(phase.clamp(1, 6)) - 1]
}

/// Owns the live save and drives the economy and persistence on a cadence.
///
/// The loop never awaits. Network work is handed back to the host as
/// prepared writes and requests; their outcomes come back through
/// `finish_sign_in` and `record_comms`.
pub struct GameLoop<L, R> {
    config: GameConfig,
    state: SaveState,
    derived: Derived,
    coordinator: Coordinator<L, R>,
    input: InputQueue,
    slow: FixedTimestep,
    /// Emitted since the last publish.
    events: Vec<GameEvent>,
    /// Published at the end of the last tick, read by the host.
    frame_events: Vec<GameEvent>,
    /// Closed while a sign-in reconciliation is running.
    reconciling: bool,
    /// The device's copy, held for the running reconciliation.
    sign_in_local: Option<SaveState>,
    /// A save requested while the gate was closed; runs once it reopens.
    deferred_flush: bool,
    deferred_name: Option<String>,
    last_local_save_ms: u64,
    last_activity_ms: u64,
    pending_comms_event: Option<&'static str>,
    comms_status: CommsStatus,
    last_line: Option<CommsLine>,
}

impl<L: LocalStore, R: RemoteStore> GameLoop<L, R> {
    pub fn new(coordinator: Coordinator<L, R>, config: GameConfig) -> Self {
        let slow = FixedTimestep::new(config.slow_tick_dt()).with_max_steps(1);
        Self {
            config,
            state: SaveState::default(),
            derived: Derived::default(),
            coordinator,
            input: InputQueue::new(),
            slow,
            events: Vec::new(),
            frame_events: Vec::new(),
            reconciling: false,
            sign_in_local: None,
            deferred_flush: false,
            deferred_name: None,
            last_local_save_ms: 0,
            last_activity_ms: 0,
            pending_comms_event: None,
            comms_status: CommsStatus::Idle,
            last_line: None,
        }
    }

    pub fn state(&self) -> &SaveState {
        &self.state
    }

    pub fn derived(&self) -> &Derived {
        &self.derived
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &Coordinator<L, R> {
        &self.coordinator
    }

    pub fn is_reconciling(&self) -> bool {
        self.reconciling
    }

    /// Events published by the last tick.
    pub fn frame_events(&self) -> &[GameEvent] {
        &self.frame_events
    }

    pub fn last_line(&self) -> Option<&CommsLine> {
        self.last_line.as_ref()
    }

    fn emit(&mut self, kind: EventKind, a: f32, b: f32, c: f32) {
        self.events.push(GameEvent::new(kind, a, b, c));
    }

    fn refresh_derived(&mut self) {
        self.derived = recompute(&self.state);
    }

    /// Load the local save and credit the time away. Call once at startup.
    pub fn boot(&mut self, now_ms: u64) -> OfflineReport {
        let Some(mut state) = self.coordinator.load_local() else {
            log::info!("boot: no local save, starting fresh");
            self.state = SaveState::default();
            self.refresh_derived();
            self.last_local_save_ms = now_ms;
            return OfflineReport::default();
        };

        let report = offline_report(&mut state, now_ms, &self.config);
        self.state = state;
        self.refresh_derived();
        // Stamp right away so the same absence is never credited twice.
        self.state.touch(now_ms);
        self.coordinator.save_local(&self.state);
        self.last_local_save_ms = now_ms;

        if report.gained > 0.0 {
            self.emit(
                EventKind::OfflineGain,
                report.elapsed_secs as f32,
                report.gained as f32,
                if report.capped { 1.0 } else { 0.0 },
            );
        }
        report
    }

    pub fn push_input(&mut self, input: GameInput) {
        self.input.push(input);
    }

    /// Advance one frame.
    pub fn tick(&mut self, frame_dt: f32, now_ms: u64) -> TickReport {
        let mut report = TickReport::default();
        self.frame_events.clear();

        if self.reconciling {
            // Inputs stay queued and nothing accrues until the sync resolves.
            self.publish_events();
            return report;
        }

        let dt = clamp_frame_dt(frame_dt, self.config.max_frame_dt);
        let phase_before = self.state.phase;

        for input in self.input.drain() {
            self.apply_input(input, now_ms, &mut report);
        }

        formulas::accrue(&mut self.state, &self.derived, f64::from(dt));
        formulas::corruption_tick(&mut self.state, f64::from(dt));

        if self.state.phase != phase_before {
            log::info!("phase {} -> {}", phase_before, self.state.phase);
            self.emit(EventKind::PhaseChanged, f32::from(self.state.phase), f32::from(phase_before), 0.0);
            if self.state.phase > phase_before {
                self.pending_comms_event = Some("phase");
            }
        }

        if self.slow.accumulate(dt) > 0 {
            report.hud_due = true;
            let autosave_due = now_ms.saturating_sub(self.last_local_save_ms) >= self.config.autosave_interval_ms;
            if self.state.meta.dirty && autosave_due {
                self.persist(now_ms, false, &mut report);
            }
            report.comms = self.take_comms_request(now_ms);
        }

        self.publish_events();
        report
    }

    fn publish_events(&mut self) {
        self.frame_events.append(&mut self.events);
    }

    fn apply_input(&mut self, input: GameInput, now_ms: u64, report: &mut TickReport) {
        self.last_activity_ms = now_ms;
        match input {
            GameInput::Tap => {
                formulas::tap(&mut self.state, &self.derived);
            }
            GameInput::Buy(id) => match formulas::buy(&mut self.state, id) {
                Ok(_) => {
                    self.refresh_derived();
                    self.emit(EventKind::Purchased, id as u32 as f32, self.state.level(id) as f32, 0.0);
                    self.persist(now_ms, false, report);
                }
                Err(e) => log::debug!("purchase refused: {}", e),
            },
            GameInput::Rite => match formulas::do_rite(&mut self.state) {
                Ok(gained) => {
                    self.refresh_derived();
                    self.emit(EventKind::Rite, gained as f32, self.state.build as f32, 0.0);
                    self.pending_comms_event = Some("rite");
                    self.persist(now_ms, true, report);
                }
                Err(e) => log::debug!("rite refused: {}", e),
            },
        }
    }

    /// Stamp, write locally, then queue the remote write if one is due.
    fn persist(&mut self, now_ms: u64, force: bool, report: &mut TickReport) {
        self.state.touch(now_ms);
        let saved = self.coordinator.save_local(&self.state);
        self.last_local_save_ms = now_ms;
        self.emit(EventKind::Saved, if saved { 1.0 } else { 0.0 }, 0.0, 0.0);
        if let Some(write) = self.coordinator.prepare_remote_write(&mut self.state, force, now_ms) {
            report.remote_writes.push(write);
        }
    }

    /// Explicit save: always local, and a forced remote write when signed in.
    /// While a reconciliation runs, the save is deferred until it resolves.
    pub fn save_now(&mut self, now_ms: u64) -> Option<RemoteWrite> {
        if self.reconciling {
            log::debug!("save deferred until sign-in resolves");
            self.deferred_flush = true;
            return None;
        }
        let mut report = TickReport::default();
        self.persist(now_ms, true, &mut report);
        report.remote_writes.pop()
    }

    pub fn rename(&mut self, name: &str, now_ms: u64) -> Option<RemoteWrite> {
        if self.reconciling {
            log::debug!("rename deferred until sign-in resolves");
            self.deferred_name = Some(name.to_string());
            return None;
        }
        self.state.profile.name = normalize_name(name);
        self.state.mark_dirty();
        let mut report = TickReport::default();
        self.persist(now_ms, false, &mut report);
        report.remote_writes.pop()
    }

    /// Destroy the local record and start over in memory. Refused while a
    /// reconciliation runs; returns whether the wipe happened.
    pub fn wipe_local(&mut self) -> bool {
        if self.reconciling {
            log::warn!("wipe refused while sign-in is resolving");
            return false;
        }
        self.coordinator.wipe_local();
        self.state = SaveState::default();
        self.refresh_derived();
        self.last_local_save_ms = 0;
        true
    }

    // -- Sign-in --

    /// Close the gate and remember this device's copy. Returns the user id
    /// whose row the host must fetch.
    pub fn begin_sign_in(&mut self, identity: Identity) -> String {
        let user_id = identity.user_id.clone();
        self.sign_in_local = self.coordinator.has_local().then(|| self.state.clone());
        self.coordinator.sign_in(identity);
        self.reconciling = true;
        user_id
    }

    /// Adopt the reconciled state, or fall back to guest mode when the fetch
    /// failed. Reopens the gate; queued inputs apply on the next tick.
    /// Returns the seed write to ship, if any.
    pub fn finish_sign_in(&mut self, fetched: Result<Option<RemoteRow>, RemoteError>, now_ms: u64) -> Option<RemoteWrite> {
        self.resolve_fetch(fetched, now_ms).ok().and_then(|(_, seed)| seed)
    }

    fn resolve_fetch(
        &mut self,
        fetched: Result<Option<RemoteRow>, RemoteError>,
        now_ms: u64,
    ) -> Result<(SaveSource, Option<RemoteWrite>), RemoteError> {
        if !self.reconciling {
            log::debug!("sign-in result arrived after sign-out, ignored");
            return Err(RemoteError::Unauthenticated);
        }
        let local = self.sign_in_local.take();
        self.reconciling = false;
        let row = match fetched {
            Ok(row) => row,
            Err(e) => {
                log::warn!("sign-in sync failed, continuing offline: {}", e);
                self.coordinator.sign_out();
                self.emit(EventKind::Synced, 2.0, 0.0, 0.0);
                self.apply_deferred(now_ms);
                return Err(e);
            }
        };

        let resolution = self.coordinator.resolve_sign_in(local, row, now_ms);
        let source = resolution.reconciled.source;
        self.state = resolution.reconciled.state;
        self.refresh_derived();
        self.last_local_save_ms = now_ms;
        let code = match source {
            SaveSource::Local => 0.0,
            SaveSource::Remote => 1.0,
        };
        self.emit(EventKind::Synced, code, 0.0, 0.0);
        // A deferred save carries the adopted state too, freshly stamped.
        let write = self.apply_deferred(now_ms).or(resolution.seed);
        Ok((source, write))
    }

    /// Run the rename and save held back while the gate was closed.
    fn apply_deferred(&mut self, now_ms: u64) -> Option<RemoteWrite> {
        let flush = std::mem::take(&mut self.deferred_flush);
        let name = self.deferred_name.take();
        let renamed = name.is_some();
        if let Some(name) = name {
            self.state.profile.name = normalize_name(&name);
            self.state.mark_dirty();
        }
        if flush || renamed {
            self.save_now(now_ms)
        } else {
            None
        }
    }

    /// Complete sign-in against the coordinator's own remote.
    pub async fn sign_in(&mut self, identity: Identity, now_ms: u64) -> Result<SaveSource, RemoteError> {
        let user_id = self.begin_sign_in(identity);
        let fetched = self.coordinator.remote().fetch(&user_id).await;
        let (source, seed) = self.resolve_fetch(fetched, now_ms)?;
        if let Some(seed) = seed {
            if let Err(e) = self.coordinator.remote().upsert(&seed).await {
                log::warn!("sign-in seed write failed: {}", e);
            }
        }
        Ok(source)
    }

    /// Flush with a forced write, then drop the identity. Signing out while
    /// a reconciliation runs cancels it without writing anything remote.
    pub fn sign_out(&mut self, now_ms: u64) -> Option<RemoteWrite> {
        if self.reconciling {
            log::info!("sign-in cancelled");
            self.reconciling = false;
            self.sign_in_local = None;
            self.coordinator.sign_out();
            self.apply_deferred(now_ms);
            return None;
        }
        let write = self.save_now(now_ms);
        self.coordinator.sign_out();
        write
    }

    // -- Comms --

    /// Next comms call to make, if a cooldown allows one. Stamps the timer.
    pub fn take_comms_request(&mut self, now_ms: u64) -> Option<CommsRequest> {
        if let Some(event) = self.pending_comms_event.take() {
            if ai_ready(&self.state, now_ms, &self.config) {
                self.state.timers.last_ai_at = now_ms;
                self.state.mark_dirty();
                self.comms_status = CommsStatus::Waiting;
                return Some(CommsRequest::from_state(event, speaker_for_phase(self.state.phase), &self.state));
            }
            log::debug!("comms: {} dropped, cooling down", event);
        }
        if ambient_ready(&self.state, now_ms, self.last_activity_ms, &self.config) {
            self.state.timers.last_ambient_at = now_ms;
            self.state.mark_dirty();
            self.comms_status = CommsStatus::Waiting;
            return Some(CommsRequest::from_state("ambient", speaker_for_phase(self.state.phase), &self.state));
        }
        None
    }

    /// Record the outcome of a comms call. Failures only change the status.
    pub fn record_comms(&mut self, outcome: Result<Option<CommsLine>, RemoteError>) {
        match outcome {
            Ok(Some(line)) => {
                self.comms_status = CommsStatus::Delivered;
                self.last_line = Some(line);
            }
            Ok(None) => self.comms_status = CommsStatus::Delivered,
            Err(e) => {
                log::warn!("comms call failed: {}", e);
                self.comms_status = CommsStatus::Failed;
            }
        }
    }

    pub fn sync_mode(&self) -> SyncMode {
        if self.reconciling {
            SyncMode::Reconciling
        } else if self.coordinator.is_authenticated() {
            SyncMode::Cloud
        } else {
            SyncMode::Guest
        }
    }

    pub fn hud(&self) -> HudSnapshot {
        HudSnapshot::capture(&self.state, &self.derived, self.sync_mode(), self.comms_status)
    }
}
