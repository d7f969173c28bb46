//! Browser transport for the streaming endpoints: a `fetch` POST whose body
//! is read chunk by chunk, aborted when the stream is dropped.

use futures::Stream;
use js_sys::{Reflect, Uint8Array};
use log::debug;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{AbortController, Headers, ReadableStreamDefaultReader, Request, RequestInit, Response};

use crate::error::TransportError;
use crate::types::ErrorBody;

fn network(err: JsValue) -> TransportError {
    TransportError::Network(
        err.as_string()
            .or_else(|| {
                Reflect::get(&err, &JsValue::from_str("message"))
                    .ok()
                    .and_then(|m| m.as_string())
            })
            .unwrap_or_else(|| "request could not be completed".to_string()),
    )
}

fn window() -> Result<web_sys::Window, TransportError> {
    web_sys::window().ok_or_else(|| TransportError::Network("no window available".into()))
}

trait Abort {
    fn abort(&self);
}

impl Abort for AbortController {
    fn abort(&self) {
        AbortController::abort(self)
    }
}

/// Aborts the underlying request when dropped. Created before the request is
/// sent, so dropping a run that is still waiting for headers aborts it too.
struct AbortOnDrop<A: Abort>(A);

impl<A: Abort> Drop for AbortOnDrop<A> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

struct BodyReader {
    reader: ReadableStreamDefaultReader,
    _abort: AbortOnDrop<AbortController>,
}

impl BodyReader {
    async fn next_chunk(&self) -> Option<Result<Vec<u8>, TransportError>> {
        let result = match JsFuture::from(self.reader.read()).await {
            Ok(result) => result,
            Err(e) => return Some(Err(network(e))),
        };
        let done = Reflect::get(&result, &JsValue::from_str("done"))
            .ok()
            .and_then(|d| d.as_bool())
            .unwrap_or(true);
        if done {
            return None;
        }
        match Reflect::get(&result, &JsValue::from_str("value")) {
            Ok(value) => Some(Ok(Uint8Array::new(&value).to_vec())),
            Err(e) => Some(Err(network(e))),
        }
    }
}

async fn post_json(url: &str, body: &str, abort: &AbortController) -> Result<Response, TransportError> {
    let headers = Headers::new().map_err(network)?;
    headers
        .set("Content-Type", "application/json")
        .map_err(network)?;
    headers.set("Accept", "text/event-stream").map_err(network)?;

    let init = RequestInit::new();
    init.set_method("POST");
    init.set_headers(&headers);
    init.set_body(&JsValue::from_str(body));
    init.set_signal(Some(&abort.signal()));

    let request = Request::new_with_str_and_init(url, &init).map_err(network)?;
    let response = JsFuture::from(window()?.fetch_with_request(&request))
        .await
        .map_err(network)?;
    response.dyn_into::<Response>().map_err(network)
}

async fn failure(response: &Response) -> TransportError {
    let status = response.status();
    let message = match response.json() {
        Ok(promise) => JsFuture::from(promise)
            .await
            .ok()
            .and_then(|value| serde_wasm_bindgen::from_value::<ErrorBody>(value).ok())
            .map(|body| body.error),
        Err(_) => None,
    };
    debug!("Stream request failed with {status}: {message:?}");
    TransportError::Status { status, message }
}

/// POSTs `body` to `url` and yields the raw response body in chunks.
///
/// The request is aborted as soon as either the pending future or the body
/// stream is dropped. A non-2xx response resolves to `TransportError::Status`
/// with the server's `{"error": ...}` message when one was sent.
pub async fn open_event_stream(
    url: &str,
    body: String,
) -> Result<impl Stream<Item = Result<Vec<u8>, TransportError>>, TransportError> {
    let abort = AbortOnDrop(AbortController::new().map_err(network)?);
    let response = post_json(url, &body, &abort.0).await?;

    if !response.ok() {
        return Err(failure(&response).await);
    }

    let reader = response
        .body()
        .ok_or_else(|| TransportError::Network("response has no body".into()))?
        .get_reader()
        .unchecked_into::<ReadableStreamDefaultReader>();

    let body = BodyReader {
        reader,
        _abort: abort,
    };
    Ok(futures::stream::unfold(body, |body| async move {
        let chunk = body.next_chunk().await?;
        Some((chunk, body))
    }))
}

/// Tells the server to stop producing `stream_id`. Best effort.
pub async fn notify_server_cancel(stream_id: &str) {
    let url = format!("/api/stream/cancel?stream_id={}", urlencoding::encode(stream_id));
    let result = async {
        let init = RequestInit::new();
        init.set_method("POST");
        let request = Request::new_with_str_and_init(&url, &init).map_err(network)?;
        JsFuture::from(window()?.fetch_with_request(&request))
            .await
            .map_err(network)
    }
    .await;
    if let Err(e) = result {
        debug!("Cancel notification for {stream_id} failed: {e}");
    }
}
