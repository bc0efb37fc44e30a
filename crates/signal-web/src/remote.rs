use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use signal_core::{RemoteError, RemoteRow, RemoteStore, RemoteWrite};

use crate::http::send;

const SAVES_PATH: &str = "/rest/v1/saves";

/// Row shape on the wire. `updated_at` is the backend's timestamp column.
#[derive(Deserialize)]
struct WireRow {
    user_id: String,
    #[serde(default)]
    state: Value,
    #[serde(default)]
    updated_at: Option<String>,
}

#[derive(Serialize)]
struct WireUpsert<'a> {
    user_id: &'a str,
    state: &'a Value,
    updated_at: String,
}

/// Decode a `select` response. The column timestamp goes through
/// `parse_time`; unparseable values become `None`.
fn decode_rows(body: &str, parse_time: impl Fn(&str) -> Option<u64>) -> Result<Option<RemoteRow>, RemoteError> {
    let rows: Vec<WireRow> = serde_json::from_str(body)?;
    Ok(rows.into_iter().next().map(|row| RemoteRow {
        user_id: row.user_id,
        state: row.state,
        updated_at_ms: row.updated_at.as_deref().and_then(&parse_time),
    }))
}

fn parse_js_date(text: &str) -> Option<u64> {
    let ms = js_sys::Date::parse(text);
    (ms.is_finite() && ms >= 0.0).then_some(ms as u64)
}

fn iso_string(ms: u64) -> String {
    String::from(js_sys::Date::new(&wasm_bindgen::JsValue::from_f64(ms as f64)).to_iso_string())
}

/// The `saves` table behind a PostgREST-style endpoint.
///
/// Clones share the access token, so the runner can hand a clone to each
/// background request and still swap the token on sign-in.
#[derive(Clone)]
pub struct RestRemote {
    base_url: String,
    api_key: String,
    token: Rc<RefCell<Option<String>>>,
}

impl RestRemote {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            token: Rc::new(RefCell::new(None)),
        }
    }

    pub fn set_token(&self, token: Option<String>) {
        *self.token.borrow_mut() = token;
    }

    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty()
    }

    fn bearer(&self) -> Result<String, RemoteError> {
        match self.token.borrow().as_deref() {
            Some(token) if !token.is_empty() => Ok(format!("Bearer {}", token)),
            _ => Err(RemoteError::Unauthenticated),
        }
    }

    fn row_url(&self, user_id: &str) -> String {
        let id = String::from(js_sys::encode_uri_component(user_id));
        format!("{}{}?user_id=eq.{}", self.base_url, SAVES_PATH, id)
    }
}

impl RemoteStore for RestRemote {
    async fn fetch(&self, user_id: &str) -> Result<Option<RemoteRow>, RemoteError> {
        let auth = self.bearer()?;
        let url = format!("{}&select=user_id,state,updated_at", self.row_url(user_id));
        let headers = [("apikey", self.api_key.as_str()), ("Authorization", auth.as_str())];
        let response = send("GET", &url, &headers, None).await?.into_result()?;
        decode_rows(&response.body, parse_js_date)
    }

    async fn upsert(&self, write: &RemoteWrite) -> Result<(), RemoteError> {
        let auth = self.bearer()?;
        let url = format!("{}{}?on_conflict=user_id", self.base_url, SAVES_PATH);
        let body = serde_json::to_string(&[WireUpsert {
            user_id: &write.user_id,
            state: &write.state,
            updated_at: iso_string(write.updated_at_ms),
        }])?;
        let headers = [
            ("apikey", self.api_key.as_str()),
            ("Authorization", auth.as_str()),
            ("Prefer", "resolution=merge-duplicates,return=minimal"),
        ];
        send("POST", &url, &headers, Some(&body)).await?.into_result()?;
        log::debug!("remote: upserted save for {}", write.user_id);
        Ok(())
    }

    async fn delete(&self, user_id: &str) -> Result<(), RemoteError> {
        let auth = self.bearer()?;
        let headers = [("apikey", self.api_key.as_str()), ("Authorization", auth.as_str())];
        send("DELETE", &self.row_url(user_id), &headers, None).await?.into_result()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_time(text: &str) -> Option<u64> {
        (text == "2024-01-01T00:00:00Z").then_some(1_704_067_200_000)
    }

    #[test]
    fn decodes_first_row() {
        let body = r#"[{"user_id":"u1","state":{"total":5},"updated_at":"2024-01-01T00:00:00Z"}]"#;
        let row = decode_rows(body, fixed_time).unwrap().unwrap();
        assert_eq!(row.user_id, "u1");
        assert_eq!(row.state["total"], 5);
        assert_eq!(row.updated_at_ms, Some(1_704_067_200_000));
    }

    #[test]
    fn empty_result_is_no_row() {
        assert_eq!(decode_rows("[]", fixed_time).unwrap(), None);
    }

    #[test]
    fn bad_column_timestamp_is_dropped() {
        let body = r#"[{"user_id":"u1","state":null,"updated_at":"yesterday"}]"#;
        let row = decode_rows(body, fixed_time).unwrap().unwrap();
        assert_eq!(row.updated_at_ms, None);
    }

    #[test]
    fn non_array_body_is_a_decode_error() {
        assert!(matches!(decode_rows("{}", fixed_time), Err(RemoteError::Decode(_))));
    }
}
