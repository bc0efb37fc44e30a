use signal_core::RemoteError;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{Request, RequestInit, Response};

/// Status and body text of a finished request.
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx response into a `RemoteError`.
    pub fn into_result(self) -> Result<HttpResponse, RemoteError> {
        match self.status {
            401 => Err(RemoteError::Unauthenticated),
            _ if self.is_success() => Ok(self),
            status => Err(RemoteError::Status {
                status,
                body: self.body,
            }),
        }
    }
}

fn js_err(value: JsValue) -> RemoteError {
    let text = value
        .as_string()
        .or_else(|| value.dyn_ref::<js_sys::Error>().map(|e| String::from(e.message())))
        .unwrap_or_else(|| format!("{:?}", value));
    RemoteError::Transport(text)
}

/// One `fetch` round trip. Transport failures and unreadable bodies map to
/// `RemoteError::Transport`; any status is returned as-is.
pub async fn send(
    method: &str,
    url: &str,
    headers: &[(&str, &str)],
    body: Option<&str>,
) -> Result<HttpResponse, RemoteError> {
    let window = web_sys::window().ok_or_else(|| RemoteError::Transport("no window".to_string()))?;

    let init = RequestInit::new();
    init.set_method(method);
    if let Some(body) = body {
        init.set_body(&JsValue::from_str(body));
    }

    let request = Request::new_with_str_and_init(url, &init).map_err(js_err)?;
    let request_headers = request.headers();
    for (name, value) in headers {
        request_headers.set(name, value).map_err(js_err)?;
    }
    if body.is_some() {
        request_headers.set("Content-Type", "application/json").map_err(js_err)?;
    }

    let value = JsFuture::from(window.fetch_with_request(&request)).await.map_err(js_err)?;
    let response: Response = value.dyn_into().map_err(js_err)?;
    let text = JsFuture::from(response.text().map_err(js_err)?).await.map_err(js_err)?;

    Ok(HttpResponse {
        status: response.status(),
        body: text.as_string().unwrap_or_default(),
    })
}
