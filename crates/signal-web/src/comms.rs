use signal_core::comms::{parse_reply, CommsLine, CommsRequest};
use signal_core::RemoteError;

use crate::http::send;

/// Ask the comms function for one line. `Ok(None)` when it answered with
/// nothing usable.
pub async fn post_comms(url: &str, api_key: &str, request: &CommsRequest) -> Result<Option<CommsLine>, RemoteError> {
    let body = serde_json::to_string(request)?;
    let auth = format!("Bearer {}", api_key);
    let headers = [("apikey", api_key), ("Authorization", auth.as_str())];
    let response = send("POST", url, &headers, Some(&body)).await?.into_result()?;
    Ok(parse_reply(&response.body))
}
