//! Contract with the comms collaborator: a remote function that answers
//! game events with a short in-character line.

use serde::{Deserialize, Serialize};

use crate::config::GameConfig;
use crate::save::SaveState;

pub const MAX_WHO_CHARS: usize = 18;
pub const MAX_LINE_CHARS: usize = 160;
const UNKNOWN_SPEAKER: &str = "???";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommsRequest {
    pub event: String,
    pub speaker_hint: String,
    pub player_name: String,
    pub phase: u8,
    pub build: u32,
    pub signal: u64,
    pub total: u64,
    /// Rounded to three decimals.
    pub corruption: f64,
}

impl CommsRequest {
    pub fn from_state(event: &str, speaker_hint: &str, state: &SaveState) -> Self {
        Self {
            event: event.to_string(),
            speaker_hint: speaker_hint.to_string(),
            player_name: state.profile.name.clone(),
            phase: state.phase,
            build: state.build,
            signal: state.signal.max(0.0).floor() as u64,
            total: state.total.max(0.0).floor() as u64,
            corruption: (state.corruption * 1000.0).round() / 1000.0,
        }
    }
}

/// Raw collaborator response. Both fields are optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CommsReply {
    pub who: String,
    pub text: String,
}

/// A line ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommsLine {
    pub who: String,
    pub text: String,
}

/// Health of the side channel, shown as a status dot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommsStatus {
    #[default]
    Idle,
    Waiting,
    Delivered,
    Failed,
}

/// First sentence of `text`: everything up to the first `.`, `!` or `?`
/// that is followed by whitespace.
pub fn first_sentence(text: &str) -> &str {
    let text = text.trim();
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            if let Some((_, next)) = chars.peek() {
                if next.is_whitespace() {
                    return &text[..i + c.len_utf8()];
                }
            }
        }
    }
    text
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Trim a collaborator reply down to one displayable line.
pub fn shape_reply(reply: &CommsReply) -> Option<CommsLine> {
    let text = truncate_chars(first_sentence(&reply.text), MAX_LINE_CHARS);
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let who = truncate_chars(reply.who.trim(), MAX_WHO_CHARS);
    let who = who.trim();
    Some(CommsLine {
        who: if who.is_empty() { UNKNOWN_SPEAKER.to_string() } else { who.to_string() },
        text: text.to_string(),
    })
}

/// Parse and shape a raw response body. Malformed bodies yield `None`.
pub fn parse_reply(body: &str) -> Option<CommsLine> {
    match serde_json::from_str::<CommsReply>(body) {
        Ok(reply) => shape_reply(&reply),
        Err(e) => {
            log::warn!("comms: malformed reply: {}", e);
            None
        }
    }
}

fn cooled(last: u64, now_ms: u64, cooldown_ms: u64) -> bool {
    last == 0 || now_ms.saturating_sub(last) >= cooldown_ms
}

/// Event-driven calls (phase change, Rite) wait out the AI cooldown.
pub fn ai_ready(state: &SaveState, now_ms: u64, config: &GameConfig) -> bool {
    cooled(state.timers.last_ai_at, now_ms, config.ai_cooldown_ms)
}

/// Ambient chatter needs its own cooldown and a player who is not AFK.
pub fn ambient_ready(state: &SaveState, now_ms: u64, last_activity_ms: u64, config: &GameConfig) -> bool {
    let active = last_activity_ms > 0 && now_ms.saturating_sub(last_activity_ms) <= config.afk_window_ms;
    active && cooled(state.timers.last_ambient_at, now_ms, config.ambient_cooldown_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(who: &str, text: &str) -> CommsReply {
        CommsReply {
            who: who.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn keeps_first_sentence_only() {
        let line = shape_reply(&reply("Echo", "The carrier holds. Do not look back! Ever.")).unwrap();
        assert_eq!(line.text, "The carrier holds.");
        assert_eq!(line.who, "Echo");
    }

    #[test]
    fn punctuation_without_whitespace_does_not_split() {
        assert_eq!(first_sentence("v1.2 is live"), "v1.2 is live");
        assert_eq!(first_sentence("Why?Because"), "Why?Because");
        assert_eq!(first_sentence("Really?  Yes."), "Really?");
    }

    #[test]
    fn caps_lengths() {
        let long = "a".repeat(400);
        let line = shape_reply(&reply("ABCDEFGHIJKLMNOPQRSTUVWXYZ", &long)).unwrap();
        assert_eq!(line.text.chars().count(), MAX_LINE_CHARS);
        assert_eq!(line.who.chars().count(), MAX_WHO_CHARS);
    }

    #[test]
    fn blank_text_is_dropped_and_blank_speaker_is_unknown() {
        assert!(shape_reply(&reply("Echo", "   ")).is_none());
        assert_eq!(shape_reply(&reply(" ", "Hi.")).unwrap().who, "???");
    }

    #[test]
    fn malformed_body_is_none() {
        assert!(parse_reply("<html>502</html>").is_none());
        assert_eq!(parse_reply(r#"{"text":"Static. More static."}"#).unwrap().text, "Static.");
    }

    #[test]
    fn request_rounds_numbers() {
        let mut s = SaveState::default();
        s.signal = 12.9;
        s.total = 99.99;
        s.corruption = 0.123456;
        let req = CommsRequest::from_state("phase", "operator", &s);
        assert_eq!(req.signal, 12);
        assert_eq!(req.total, 99);
        assert_eq!(req.corruption, 0.123);
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(body["player_name"], "GUEST");
        assert_eq!(body["speaker_hint"], "operator");
    }

    #[test]
    fn cooldowns() {
        let config = GameConfig::default();
        let mut s = SaveState::default();
        let now = 1_000_000;
        assert!(ai_ready(&s, now, &config));
        s.timers.last_ai_at = now - 179_000;
        assert!(!ai_ready(&s, now, &config));
        s.timers.last_ai_at = now - 180_000;
        assert!(ai_ready(&s, now, &config));

        assert!(!ambient_ready(&s, now, 0, &config));
        assert!(!ambient_ready(&s, now, now - 21_000, &config));
        assert!(ambient_ready(&s, now, now - 5_000, &config));
        s.timers.last_ambient_at = now - 60_000;
        assert!(!ambient_ready(&s, now, now - 5_000, &config));
    }
}
