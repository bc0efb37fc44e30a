//! Total mapping from untrusted JSON to a valid [`SaveState`].
//!
//! Every field is read independently: a bad value degrades to that field's
//! default and never poisons the rest of the record.

use serde_json::{Map, Value};

use crate::economy::upgrades::UpgradeId;
use crate::save::state::{
    normalize_name, Meta, Profile, SaveState, Timers, Upgrades, MAX_BUILD, MAX_RELICS, MAX_RESOURCE,
    MAX_TIMESTAMP_MS, MIN_BUILD, SAVE_VERSION,
};

/// Prefix marking runtime-only keys that must never reach storage.
pub const TRANSIENT_PREFIX: char = '_';

/// Convert any JSON value into a valid state. Never fails.
pub fn sanitize(raw: &Value) -> SaveState {
    let Some(obj) = raw.as_object() else {
        return SaveState::default();
    };

    let version = read_int(obj.get("version"), 0, 0, u64::from(u32::MAX)) as u32;
    if version > SAVE_VERSION {
        log::warn!("save written by schema v{}, reading as v{}", version, SAVE_VERSION);
    }
    let migrated;
    let obj = if version < SAVE_VERSION {
        migrated = migrate(obj.clone(), version);
        &migrated
    } else {
        obj
    };

    let defaults = SaveState::default();
    let mut state = SaveState {
        version: SAVE_VERSION,
        profile: read_profile(obj.get("profile")),
        build: read_int(obj.get("build"), u64::from(defaults.build), u64::from(MIN_BUILD), u64::from(MAX_BUILD))
            as u32,
        relics: read_real(obj.get("relics"), defaults.relics, 0.0, MAX_RELICS),
        signal: read_real(obj.get("signal"), defaults.signal, 0.0, MAX_RESOURCE),
        total: read_real(obj.get("total"), defaults.total, 0.0, MAX_RESOURCE),
        corruption: read_real(obj.get("corruption"), defaults.corruption, 0.0, 1.0),
        phase: defaults.phase,
        upgrades: read_upgrades(obj.get("upgrades")),
        timers: read_timers(obj.get("timers")),
        meta: read_meta(obj.get("meta")),
    };
    state.sync_phase();
    state
}

/// Parse then sanitize. `None` only when `json` is not JSON at all.
pub fn sanitize_str(json: &str) -> Option<SaveState> {
    match serde_json::from_str::<Value>(json) {
        Ok(raw) => Some(sanitize(&raw)),
        Err(e) => {
            log::warn!("discarding unparseable save: {}", e);
            None
        }
    }
}

/// Bring an older record up to [`SAVE_VERSION`] before the field merge.
fn migrate(mut obj: Map<String, Value>, from: u32) -> Map<String, Value> {
    // v0 (unversioned) shares the v1 shape; only the tag changes.
    obj.insert("version".to_string(), Value::from(SAVE_VERSION));
    log::debug!("migrated save from v{} to v{}", from, SAVE_VERSION);
    obj
}

/// Lenient numeric coercion: numbers, numeric strings and booleans.
fn coerce(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            s.parse::<f64>().ok()?
        }
        Value::Bool(b) => f64::from(u8::from(*b)),
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn read_real(value: Option<&Value>, default: f64, min: f64, max: f64) -> f64 {
    coerce(value).map_or(default, |n| n.clamp(min, max))
}

fn read_int(value: Option<&Value>, default: u64, min: u64, max: u64) -> u64 {
    match coerce(value) {
        Some(n) => {
            let n = n.trunc();
            if n <= min as f64 {
                min
            } else if n >= max as f64 {
                max
            } else {
                n as u64
            }
        }
        None => default,
    }
}

fn read_timestamp(value: Option<&Value>) -> u64 {
    read_int(value, 0, 0, MAX_TIMESTAMP_MS)
}

fn object(value: Option<&Value>) -> Option<&Map<String, Value>> {
    value.and_then(Value::as_object)
}

fn read_profile(value: Option<&Value>) -> Profile {
    let name = object(value).and_then(|p| p.get("name")).and_then(|v| match v {
        Value::String(s) => Some(normalize_name(s)),
        Value::Number(n) => Some(normalize_name(&n.to_string())),
        _ => None,
    });
    match name {
        Some(name) => Profile { name },
        None => Profile::default(),
    }
}

fn read_upgrades(value: Option<&Value>) -> Upgrades {
    let mut upgrades = Upgrades::default();
    let Some(map) = object(value) else {
        return upgrades;
    };
    for (key, level) in map {
        let Some(id) = UpgradeId::from_key(key) else {
            continue;
        };
        let level = read_int(Some(level), 0, 0, u64::from(id.def().max_level));
        upgrades.set_level(id, level as u32);
    }
    upgrades
}

fn read_timers(value: Option<&Value>) -> Timers {
    let Some(t) = object(value) else {
        return Timers::default();
    };
    Timers {
        last_ai_at: read_timestamp(t.get("lastAiAt")),
        last_ambient_at: read_timestamp(t.get("lastAmbientAt")),
    }
}

fn read_meta(value: Option<&Value>) -> Meta {
    let Some(m) = object(value) else {
        return Meta::default();
    };
    Meta {
        updated_at_ms: read_timestamp(m.get("updatedAtMs")),
        last_cloud_write_ms: read_timestamp(m.get("lastCloudWriteMs")),
        dirty: false,
    }
}

/// Drop every object key starting with [`TRANSIENT_PREFIX`], at any depth.
pub fn strip_transient(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|k, _| !k.starts_with(TRANSIENT_PREFIX));
            for v in map.values_mut() {
                strip_transient(v);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(strip_transient),
        _ => {}
    }
}

/// Storage form of a state: serialized with transient keys removed.
pub fn to_storage_value(state: &SaveState) -> Result<Value, serde_json::Error> {
    let mut value = serde_json::to_value(state)?;
    strip_transient(&mut value);
    Ok(value)
}

pub fn to_storage_string(state: &SaveState) -> Result<String, serde_json::Error> {
    serde_json::to_string(&to_storage_value(state)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn assert_valid(s: &SaveState) {
        assert_eq!(s.version, SAVE_VERSION);
        assert!(s.build >= MIN_BUILD && s.build <= MAX_BUILD);
        for v in [s.relics, s.signal, s.total, s.corruption] {
            assert!(v.is_finite() && v >= 0.0);
        }
        assert!(s.corruption <= 1.0);
        assert_eq!(s.phase, crate::economy::formulas::phase_for_total(s.total));
        assert!(!s.profile.name.is_empty() && s.profile.name.chars().count() <= 18);
        for (id, lvl) in s.upgrades.iter() {
            assert!(lvl <= id.def().max_level);
        }
    }

    fn hostile_inputs() -> Vec<Value> {
        vec![
            Value::Null,
            json!([1, 2, 3]),
            json!("save"),
            json!(42),
            json!(true),
            json!({}),
            json!({ "signal": "NaN", "total": "Infinity", "relics": "-Infinity" }),
            json!({ "signal": -50, "total": 1e300, "corruption": 7, "build": 0 }),
            json!({ "signal": {}, "total": [], "corruption": null, "build": "three" }),
            json!({ "profile": "nope", "upgrades": [1, 2], "timers": 5, "meta": "x" }),
            json!({ "profile": { "name": 12345 }, "upgrades": { "tap": "7", "relay": true, "warp": 9 } }),
            json!({ "upgrades": { "band": 1e9, "auto": -3 }, "meta": { "updatedAtMs": -1 } }),
            json!({ "version": 99, "total": 40000, "phase": 1 }),
            json!({ "version": "1", "total": "12000.5", "build": 7.9 }),
        ]
    }

    #[test]
    fn sanitize_is_total_and_valid() {
        for raw in hostile_inputs() {
            let s = sanitize(&raw);
            assert_valid(&s);
        }
    }

    #[test]
    fn non_objects_become_defaults() {
        for raw in [Value::Null, json!([]), json!("x"), json!(1.5)] {
            assert_eq!(sanitize(&raw), SaveState::default());
        }
    }

    #[test]
    fn out_of_range_clamps_to_bounds() {
        let s = sanitize(&json!({
            "signal": -50,
            "total": 1e300,
            "relics": 1e300,
            "corruption": 7,
            "build": 0,
            "upgrades": { "band": 1e9, "auto": -3 },
        }));
        assert_eq!(s.signal, 0.0);
        assert_eq!(s.total, MAX_RESOURCE);
        assert_eq!(s.relics, MAX_RELICS);
        assert_eq!(s.corruption, 1.0);
        assert_eq!(s.build, MIN_BUILD);
        assert_eq!(s.level(UpgradeId::Band), UpgradeId::Band.def().max_level);
        assert_eq!(s.level(UpgradeId::Auto), 0);
    }

    #[test]
    fn non_finite_falls_back_to_default() {
        let s = sanitize(&json!({ "signal": "NaN", "total": "Infinity", "corruption": "-inf", "build": 4 }));
        assert_eq!(s.signal, 0.0);
        assert_eq!(s.total, 0.0);
        assert_eq!(s.corruption, 0.0);
        assert_eq!(s.build, 4);
    }

    #[test]
    fn coercible_values_are_accepted() {
        let s = sanitize(&json!({
            "total": "12000.5",
            "build": 7.9,
            "profile": { "name": "  ada  " },
            "upgrades": { "tap": "7", "relay": true, "warp": 9 },
        }));
        assert_eq!(s.total, 12000.5);
        assert_eq!(s.phase, 5);
        assert_eq!(s.build, 7);
        assert_eq!(s.profile.name, "ADA");
        assert_eq!(s.level(UpgradeId::Tap), 7);
        assert_eq!(s.level(UpgradeId::Relay), 1);
    }

    #[test]
    fn phase_is_derived_not_trusted() {
        let s = sanitize(&json!({ "total": 40000, "phase": 1 }));
        assert_eq!(s.phase, 6);
        let s = sanitize(&json!({ "total": 10, "phase": 6 }));
        assert_eq!(s.phase, 1);
    }

    #[test]
    fn unversioned_saves_migrate() {
        let s = sanitize(&json!({ "signal": 12, "total": 30 }));
        assert_eq!(s.version, SAVE_VERSION);
        assert_eq!(s.signal, 12.0);
        assert_eq!(s.total, 30.0);
    }

    #[test]
    fn unknown_keys_are_dropped() {
        let s = sanitize(&json!({ "signal": 3, "experimentalBoost": 99, "_cache": { "x": 1 } }));
        let stored = to_storage_value(&s).unwrap();
        let keys: Vec<_> = stored.as_object().unwrap().keys().cloned().collect();
        assert!(!keys.iter().any(|k| k == "experimentalBoost" || k == "_cache"));
    }

    #[test]
    fn storage_form_has_no_transient_keys() {
        let mut s = SaveState::default();
        s.mark_dirty();
        let stored = to_storage_value(&s).unwrap();
        assert!(stored["meta"].get("_dirty").is_none());
        assert!(stored["meta"].get("updatedAtMs").is_some());
    }

    #[test]
    fn strip_transient_recurses() {
        let mut v = json!({ "_a": 1, "b": { "_c": 2, "d": [ { "_e": 3, "f": 4 } ] } });
        strip_transient(&mut v);
        assert_eq!(v, json!({ "b": { "d": [ { "f": 4 } ] } }));
    }

    #[test]
    fn serialization_round_trip_is_idempotent() {
        let mut inputs = hostile_inputs();
        inputs.push(json!({
            "version": 1,
            "profile": { "name": "Operator" },
            "build": 3, "relics": 4.5, "signal": 1234.567, "total": 98765.4321,
            "corruption": 0.123456789,
            "upgrades": { "tap": 12, "band": 3, "resonance": 2 },
            "timers": { "lastAiAt": 1700000000000u64, "lastAmbientAt": 1700000001000u64 },
            "meta": { "updatedAtMs": 1700000002000u64, "lastCloudWriteMs": 1700000003000u64 },
        }));
        for raw in inputs {
            let once = sanitize(&raw);
            let text = to_storage_string(&once).unwrap();
            let twice = sanitize_str(&text).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn garbage_text_is_not_a_save() {
        assert!(sanitize_str("{not json").is_none());
        assert_eq!(sanitize_str("null"), Some(SaveState::default()));
    }
}
