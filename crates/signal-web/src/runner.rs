use signal_core::{
    CommsLine, CommsRequest, Coordinator, GameConfig, GameInput, GameLoop, HudSnapshot, Identity, Outbox,
    RemoteError, RemoteRow, RemoteWrite, UpgradeId,
};
use signal_core::save::to_storage_string;

use crate::remote::RestRemote;
use crate::storage::WebStorage;

pub type WebLoop = GameLoop<WebStorage, RestRemote>;

/// Network work the runner wants started. The caller spawns it after
/// releasing its borrow of the runner.
#[derive(Default)]
pub struct Jobs {
    pub write: Option<RemoteWrite>,
    pub comms: Option<CommsRequest>,
}

pub fn now_ms() -> u64 {
    js_sys::Date::now().max(0.0) as u64
}

/// Wires the game loop to the browser.
///
/// The loop itself never awaits. The runner keeps the outbox of remote
/// writes and a pending comms request; `lib.rs` drains both into
/// `spawn_local` tasks that report back through `write_finished`,
/// `sign_in_fetched` and `comms_finished`.
pub struct GameRunner {
    game: WebLoop,
    remote: RestRemote,
    outbox: Outbox,
    pending_comms: Option<CommsRequest>,
    hud: HudSnapshot,
    comms_url: String,
    api_key: String,
    initialized: bool,
}

impl GameRunner {
    pub fn new(config: GameConfig, api_base: &str, api_key: &str, comms_url: &str) -> Self {
        let remote = RestRemote::new(api_base, api_key);
        let coordinator = Coordinator::new(WebStorage::new(), remote.clone(), &config);
        Self {
            game: GameLoop::new(coordinator, config),
            remote,
            outbox: Outbox::new(),
            pending_comms: None,
            hud: HudSnapshot::default(),
            comms_url: comms_url.to_string(),
            api_key: api_key.to_string(),
            initialized: false,
        }
    }

    /// Load the local save and credit offline time. Call once after construction.
    pub fn init(&mut self) {
        let report = self.game.boot(now_ms());
        if report.gained > 0.0 {
            log::info!("welcome back: +{:.0} signal over {:.0}s", report.gained, report.elapsed_secs);
        }
        self.hud = self.game.hud();
        self.initialized = true;
    }

    pub fn push_input(&mut self, input: GameInput) {
        self.game.push_input(input);
    }

    pub fn tick(&mut self, dt: f32) {
        if !self.initialized {
            return;
        }
        let report = self.game.tick(dt, now_ms());
        for write in report.remote_writes {
            self.outbox.submit(write);
        }
        if let Some(request) = report.comms {
            if self.comms_url.is_empty() {
                self.game.record_comms(Err(RemoteError::Transport("comms endpoint not configured".to_string())));
            } else {
                self.pending_comms = Some(request);
            }
        }
        if report.hud_due {
            self.hud = self.game.hud();
        }
    }

    fn submit(&mut self, write: Option<RemoteWrite>) {
        if let Some(write) = write {
            self.outbox.submit(write);
        }
        self.hud = self.game.hud();
    }

    pub fn rename(&mut self, name: &str) {
        let write = self.game.rename(name, now_ms());
        self.submit(write);
    }

    pub fn save_now(&mut self) {
        let write = self.game.save_now(now_ms());
        self.submit(write);
    }

    /// Wipe the local record. Returns the user id whose remote row should
    /// be deleted too, when asked and signed in.
    pub fn wipe(&mut self, include_remote: bool) -> Option<String> {
        let user_id = self.game.coordinator().identity().map(|i| i.user_id.clone());
        if !self.game.wipe_local() {
            return None;
        }
        self.outbox.clear();
        self.hud = self.game.hud();
        user_id.filter(|_| include_remote)
    }

    /// Close the gate and return the user id to fetch.
    pub fn begin_sign_in(&mut self, user_id: &str, email: &str, access_token: &str) -> String {
        self.remote.set_token(Some(access_token.to_string()));
        let identity = Identity {
            user_id: user_id.to_string(),
            email: (!email.is_empty()).then(|| email.to_string()),
        };
        let user_id = self.game.begin_sign_in(identity);
        self.hud = self.game.hud();
        user_id
    }

    pub fn sign_in_fetched(&mut self, fetched: Result<Option<RemoteRow>, RemoteError>) {
        let seed = self.game.finish_sign_in(fetched, now_ms());
        self.submit(seed);
    }

    /// Flush with a forced write, then continue as a guest. The token stays
    /// set until the next sign-in so the flush can land.
    pub fn sign_out(&mut self) {
        let write = self.game.sign_out(now_ms());
        self.submit(write);
    }

    pub fn write_finished(&mut self, result: Result<(), RemoteError>) {
        self.outbox.complete();
        if let Err(e) = result {
            log::warn!("remote save failed: {}", e);
        }
    }

    pub fn comms_finished(&mut self, outcome: Result<Option<CommsLine>, RemoteError>) {
        self.game.record_comms(outcome);
        self.hud = self.game.hud();
    }

    /// Network work ready to start now.
    pub fn take_jobs(&mut self) -> Jobs {
        Jobs {
            write: self.outbox.next(),
            comms: self.pending_comms.take(),
        }
    }

    pub fn remote(&self) -> RestRemote {
        self.remote.clone()
    }

    pub fn comms_target(&self) -> (String, String) {
        (self.comms_url.clone(), self.api_key.clone())
    }

    // ---- Pointer accessors for typed-array reads ----

    pub fn hud_ptr(&self) -> *const f64 {
        self.hud.as_ptr()
    }

    pub fn hud_len(&self) -> u32 {
        self.hud.as_slice().len() as u32
    }

    pub fn events_ptr(&self) -> *const f32 {
        self.game.frame_events().as_ptr() as *const f32
    }

    /// Number of events, each `GameEvent::FLOATS` floats wide.
    pub fn events_len(&self) -> u32 {
        self.game.frame_events().len() as u32
    }

    pub fn state_json(&self) -> String {
        to_storage_string(self.game.state()).unwrap_or_default()
    }

    /// The latest comms line as `{"who","text"}`, or an empty string.
    pub fn comms_line_json(&self) -> String {
        match self.game.last_line() {
            Some(line) => serde_json::json!({ "who": line.who, "text": line.text }).to_string(),
            None => String::new(),
        }
    }
}

/// Parse a buy request from JS. Unknown keys are ignored.
pub fn upgrade_from_key(key: &str) -> Option<UpgradeId> {
    let id = UpgradeId::from_key(key);
    if id.is_none() {
        log::warn!("unknown upgrade '{}'", key);
    }
    id
}
