pub mod comms;
pub mod http;
pub mod remote;
pub mod runner;
pub mod storage;

use std::cell::RefCell;

use signal_core::auth::Credentials;
use signal_core::{GameConfig, GameInput, RemoteError, RemoteStore};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;

pub use runner::GameRunner;

thread_local! {
    static RUNNER: RefCell<Option<GameRunner>> = const { RefCell::new(None) };
}

/// Run `f` against the runner. `None` before `game_init`.
///
/// Never hold the borrow across an await: background tasks come back in
/// through here after their request settles.
fn with_runner<R>(f: impl FnOnce(&mut GameRunner) -> R) -> Option<R> {
    RUNNER.with(|cell| {
        let mut borrow = cell.borrow_mut();
        match borrow.as_mut() {
            Some(runner) => Some(f(runner)),
            None => {
                log::warn!("game not initialized, call game_init() first");
                None
            }
        }
    })
}

/// Start whatever network work the runner has queued.
fn pump() {
    let Some((jobs, remote, (comms_url, api_key))) =
        with_runner(|r| (r.take_jobs(), r.remote(), r.comms_target()))
    else {
        return;
    };

    if let Some(write) = jobs.write {
        spawn_local(async move {
            let result = remote.upsert(&write).await;
            with_runner(|r| r.write_finished(result));
            pump();
        });
    }

    if let Some(request) = jobs.comms {
        spawn_local(async move {
            let outcome = comms::post_comms(&comms_url, &api_key, &request).await;
            with_runner(|r| r.comms_finished(outcome));
        });
    }
}

/// Create the runner and load the local save.
///
/// `config_json` may be empty or partial; missing fields take defaults.
#[wasm_bindgen]
pub fn game_init(config_json: &str, api_base: &str, api_key: &str, comms_url: &str) {
    console_error_panic_hook::set_once();
    let _ = console_log::init_with_level(log::Level::Info);

    let config = if config_json.trim().is_empty() {
        GameConfig::default()
    } else {
        GameConfig::from_json(config_json).unwrap_or_else(|e| {
            log::warn!("{}, using defaults", e);
            GameConfig::default()
        })
    };

    let runner = GameRunner::new(config, api_base, api_key, comms_url);
    RUNNER.with(|cell| {
        *cell.borrow_mut() = Some(runner);
    });

    with_runner(|r| r.init());
    log::info!("signal: initialized");
}

#[wasm_bindgen]
pub fn game_tick(dt: f32) {
    with_runner(|r| r.tick(dt));
    pump();
}

#[wasm_bindgen]
pub fn game_tap() {
    with_runner(|r| r.push_input(GameInput::Tap));
}

#[wasm_bindgen]
pub fn game_buy(key: &str) {
    if let Some(id) = runner::upgrade_from_key(key) {
        with_runner(|r| r.push_input(GameInput::Buy(id)));
    }
}

#[wasm_bindgen]
pub fn game_rite() {
    with_runner(|r| r.push_input(GameInput::Rite));
}

#[wasm_bindgen]
pub fn game_rename(name: &str) {
    with_runner(|r| r.rename(name));
    pump();
}

#[wasm_bindgen]
pub fn game_save_now() {
    with_runner(|r| r.save_now());
    pump();
}

/// Wipe local progress. With `include_remote` and a signed-in player, the
/// remote row is deleted as well.
#[wasm_bindgen]
pub fn game_wipe(include_remote: bool) {
    let Some((target, remote)) = with_runner(|r| (r.wipe(include_remote), r.remote())) else {
        return;
    };
    if let Some(user_id) = target {
        spawn_local(async move {
            match remote.delete(&user_id).await {
                Ok(()) => log::info!("remote save deleted"),
                Err(e) => log::warn!("remote delete failed: {}", e),
            }
        });
    }
}

/// Adopt an authenticated session and reconcile saves. Inputs queue until
/// the reconciliation finishes.
#[wasm_bindgen]
pub fn game_sign_in(user_id: &str, email: &str, access_token: &str) {
    let Some((user_id, remote)) = with_runner(|r| (r.begin_sign_in(user_id, email, access_token), r.remote())) else {
        return;
    };
    if !remote.is_configured() {
        let unconfigured = Err(RemoteError::Transport("save backend not configured".to_string()));
        with_runner(|r| r.sign_in_fetched(unconfigured));
        return;
    }
    spawn_local(async move {
        let fetched = remote.fetch(&user_id).await;
        with_runner(|r| r.sign_in_fetched(fetched));
        pump();
    });
}

#[wasm_bindgen]
pub fn game_sign_out() {
    with_runner(|r| r.sign_out());
    pump();
}

/// Check a sign-in form before any network call. Returns an empty string
/// when valid, otherwise a message for the player.
#[wasm_bindgen]
pub fn validate_credentials(email: &str, password: &str) -> String {
    match Credentials::new(email, password) {
        Ok(_) => String::new(),
        Err(e) => e.to_string(),
    }
}

// ---- Data accessors ----

#[wasm_bindgen]
pub fn get_hud_ptr() -> *const f64 {
    with_runner(|r| r.hud_ptr()).unwrap_or(std::ptr::null())
}

#[wasm_bindgen]
pub fn get_hud_len() -> u32 {
    with_runner(|r| r.hud_len()).unwrap_or(0)
}

#[wasm_bindgen]
pub fn get_events_ptr() -> *const f32 {
    with_runner(|r| r.events_ptr()).unwrap_or(std::ptr::null())
}

#[wasm_bindgen]
pub fn get_events_len() -> u32 {
    with_runner(|r| r.events_len()).unwrap_or(0)
}

#[wasm_bindgen]
pub fn get_state_json() -> String {
    with_runner(|r| r.state_json()).unwrap_or_default()
}

#[wasm_bindgen]
pub fn get_comms_line() -> String {
    with_runner(|r| r.comms_line_json()).unwrap_or_default()
}
