//! JSON-RPC 2.0 transports.
//!
//! The node is reached through an [`RpcTransport`]. Two implementations are
//! provided and [`connect`] picks one from the endpoint scheme:
//!
//! - [`WsTransport`] for `ws://` and `wss://` (tokio-tungstenite)
//! - [`HttpTransport`] for `http://` and `https://` (reqwest)
//!
//! Calls are strictly sequential: one request is in flight at a time and
//! there is no timeout, retry or reconnect.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, trace, warn};
use url::Url;

use wasm_devtools_common::FetchError;

/// A JSON-RPC request object.
#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: &'a Value,
}

impl<'a> RpcRequest<'a> {
    /// Create a request with the given id.
    pub fn new(id: u64, method: &'a str, params: &'a Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

/// A JSON-RPC response or notification as received from the node.
#[derive(Debug, Deserialize)]
pub struct RpcResponse {
    /// Absent for notifications.
    #[serde(default)]
    pub id: Option<Value>,
    /// `Some(Value::Null)` for an explicit `null`, `None` when absent.
    #[serde(default, deserialize_with = "present")]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcErrorObject>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// The `error` member of a JSON-RPC response.
#[derive(Debug, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
}

impl RpcResponse {
    /// Returns `true` if this response answers request `id`.
    pub fn answers(&self, id: u64) -> bool {
        self.id.as_ref().and_then(Value::as_u64) == Some(id)
    }

    /// Turn the response into the call result.
    pub fn into_result(self, method: &str) -> Result<Value, FetchError> {
        match (self.error, self.result) {
            (Some(err), _) => Err(FetchError::query(
                method,
                format!("node returned error {}: {}", err.code, err.message),
            )),
            (None, Some(result)) => Ok(result),
            (None, None) => Err(FetchError::query(
                method,
                "response has neither result nor error",
            )),
        }
    }
}

/// A JSON-RPC connection to a node.
#[async_trait]
pub trait RpcTransport: Send {
    /// Perform one call and return its `result` member.
    ///
    /// A `null` result is returned as [`Value::Null`].
    async fn request(&mut self, method: &str, params: Value) -> Result<Value, FetchError>;
}

/// Connect to `endpoint`, choosing the transport from the URL scheme.
///
/// # Errors
///
/// Returns [`FetchError::InvalidConfig`] for unparsable URLs or unknown
/// schemes and [`FetchError::Connection`] if a WebSocket handshake fails.
pub async fn connect(endpoint: &str) -> Result<Box<dyn RpcTransport>, FetchError> {
    let url = Url::parse(endpoint)
        .map_err(|e| FetchError::invalid_config(format!("invalid endpoint '{endpoint}': {e}")))?;

    match url.scheme() {
        "ws" | "wss" => Ok(Box::new(WsTransport::connect(endpoint).await?)),
        "http" | "https" => Ok(Box::new(HttpTransport::new(endpoint)?)),
        other => Err(FetchError::invalid_config(format!(
            "unsupported endpoint scheme '{other}'"
        ))),
    }
}

/// JSON-RPC over a single WebSocket connection.
pub struct WsTransport {
    endpoint: String,
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    next_id: u64,
}

impl WsTransport {
    /// Open the WebSocket connection.
    pub async fn connect(endpoint: &str) -> Result<Self, FetchError> {
        let (stream, _) = connect_async(endpoint)
            .await
            .map_err(|e| FetchError::connection(endpoint, e.to_string()))?;

        info!(endpoint = %endpoint, "Connected to node");

        Ok(Self {
            endpoint: endpoint.to_string(),
            stream,
            next_id: 1,
        })
    }

    /// Read frames until the response to `id` arrives.
    async fn read_response(&mut self, method: &str, id: u64) -> Result<RpcResponse, FetchError> {
        loop {
            let message = match self.stream.next().await {
                Some(Ok(message)) => message,
                Some(Err(e)) => return Err(FetchError::query(method, e.to_string())),
                None => {
                    return Err(FetchError::query(
                        method,
                        format!("connection to {} closed", self.endpoint),
                    ));
                }
            };

            let text = match message {
                Message::Text(text) => text,
                Message::Binary(bytes) => String::from_utf8(bytes)
                    .map_err(|e| FetchError::query(method, format!("non UTF-8 frame: {e}")))?,
                Message::Close(_) => {
                    return Err(FetchError::query(
                        method,
                        format!("connection to {} closed", self.endpoint),
                    ));
                }
                // Control frames are answered by tungstenite itself.
                _ => continue,
            };

            let response: RpcResponse = serde_json::from_str(&text)
                .map_err(|e| FetchError::query(method, format!("malformed response: {e}")))?;

            if response.answers(id) {
                return Ok(response);
            }

            warn!(method = %method, id = id, "Ignoring unrelated message");
        }
    }
}

#[async_trait]
impl RpcTransport for WsTransport {
    async fn request(&mut self, method: &str, params: Value) -> Result<Value, FetchError> {
        let id = self.next_id;
        self.next_id += 1;

        let body = serde_json::to_string(&RpcRequest::new(id, method, &params))
            .map_err(|e| FetchError::query(method, e.to_string()))?;

        trace!(method = %method, id = id, "Sending request");

        self.stream
            .send(Message::Text(body))
            .await
            .map_err(|e| FetchError::query(method, e.to_string()))?;

        self.read_response(method, id).await?.into_result(method)
    }
}

impl std::fmt::Debug for WsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsTransport")
            .field("endpoint", &self.endpoint)
            .field("next_id", &self.next_id)
            .finish_non_exhaustive()
    }
}

/// JSON-RPC over HTTP POST.
#[derive(Debug)]
pub struct HttpTransport {
    client: Client,
    endpoint: String,
    next_id: u64,
}

impl HttpTransport {
    /// Create a transport for `endpoint`. No request is made yet.
    pub fn new(endpoint: &str) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(concat!("wasm-devtools/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::connection(endpoint, e.to_string()))?;

        Ok(Self::with_client(client, endpoint))
    }

    /// Create with a custom HTTP client.
    pub fn with_client(client: Client, endpoint: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
            next_id: 1,
        }
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn request(&mut self, method: &str, params: Value) -> Result<Value, FetchError> {
        let id = self.next_id;
        self.next_id += 1;

        debug!(method = %method, id = id, "Sending HTTP request");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&RpcRequest::new(id, method, &params))
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    FetchError::connection(&self.endpoint, e.to_string())
                } else {
                    FetchError::query(method, e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::query(method, format!("HTTP status {status}")));
        }

        let response: RpcResponse = response
            .json()
            .await
            .map_err(|e| FetchError::query(method, format!("malformed response: {e}")))?;

        if !response.answers(id) {
            return Err(FetchError::query(method, "response id mismatch"));
        }

        response.into_result(method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let params = json!(["0x00", 10]);
        let request = RpcRequest::new(7, "state_getKeysPaged", &params);

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "jsonrpc": "2.0",
                "id": 7,
                "method": "state_getKeysPaged",
                "params": ["0x00", 10]
            })
        );
    }

    #[test]
    fn test_response_with_null_result() {
        let response: RpcResponse =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":3,"result":null}"#).unwrap();

        assert!(response.answers(3));
        assert!(!response.answers(4));
        assert_eq!(response.into_result("state_getStorage").unwrap(), Value::Null);
    }

    #[test]
    fn test_response_with_error() {
        let response: RpcResponse = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"Method not found"}}"#,
        )
        .unwrap();

        let err = response.into_result("state_getKeysPaged").unwrap_err();
        assert!(matches!(err, FetchError::Query { .. }));
        assert!(err.to_string().contains("Method not found"));
    }

    #[test]
    fn test_response_without_result_or_error() {
        let response: RpcResponse =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1}"#).unwrap();

        assert!(response.answers(1));
        let err = response.into_result("state_getStorage").unwrap_err();
        assert!(matches!(err, FetchError::Query { .. }), "got {err:?}");
        assert!(err.to_string().contains("neither result nor error"));
    }

    #[test]
    fn test_notification_does_not_answer() {
        let response: RpcResponse = serde_json::from_str(
            r#"{"jsonrpc":"2.0","method":"chain_newHead","params":{"result":{}}}"#,
        )
        .unwrap();
        assert!(!response.answers(1));
    }

    #[tokio::test]
    async fn test_connect_rejects_unknown_scheme() {
        let result = connect("ftp://example.com").await;
        assert!(matches!(result, Err(FetchError::InvalidConfig { .. })));

        let result = connect("not a url").await;
        assert!(matches!(result, Err(FetchError::InvalidConfig { .. })));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = connect(&format!("ws://{addr}")).await;
        assert!(matches!(result, Err(FetchError::Connection { .. })));
    }

    #[tokio::test]
    async fn test_http_connect_refused() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut transport = connect(&format!("http://{addr}")).await.unwrap();
        let err = transport
            .request("state_getStorage", json!(["0x00"]))
            .await
            .unwrap_err();
        assert!(err.is_network());
    }
}
