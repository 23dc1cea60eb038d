//! HTTP peer client.
//!
//! `POST http://{endpoint}/method/{method}` with body
//! `{"target": <peer key>, "params": <payload>}`. The relay hotkey and an
//! HMAC over the body travel in headers. A JSON object reply with an
//! `answer` field yields that field; any other reply is returned whole.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::domain::{BridgeError, BridgeResult, PeerInfo, RelayCredentials};
use crate::ports::PeerClient;

/// Header carrying the relay hotkey.
pub const RELAY_KEY_HEADER: &str = "x-relay-hotkey";
/// Header carrying the hex HMAC-SHA256 of the body.
pub const RELAY_SIGNATURE_HEADER: &str = "x-relay-signature";

/// Calls provider peers over HTTP with the relay's credentials.
pub struct HttpPeerClient {
    client: Client,
    method: String,
    credentials: RelayCredentials,
}

impl HttpPeerClient {
    /// Create a client calling `method` on every peer.
    ///
    /// `connect_timeout` only bounds connection setup; the dispatcher
    /// bounds the whole call.
    pub fn new(
        method: impl Into<String>,
        credentials: RelayCredentials,
        connect_timeout: Duration,
    ) -> BridgeResult<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| BridgeError::Configuration(format!("peer client: {e}")))?;
        Ok(Self {
            client,
            method: method.into(),
            credentials,
        })
    }
}

/// Result payload of a peer reply.
pub fn extract_answer(reply: Value) -> Value {
    match reply {
        Value::Object(mut map) => match map.remove("answer") {
            Some(answer) => answer,
            None => Value::Object(map),
        },
        other => other,
    }
}

#[async_trait]
impl PeerClient for HttpPeerClient {
    async fn call(&self, peer: &PeerInfo, payload: &Value) -> BridgeResult<Value> {
        let unreachable = |reason: String| BridgeError::PeerUnreachable {
            peer: peer.id.clone(),
            reason,
        };

        let url = format!("{}/method/{}", peer.endpoint.base_url(), self.method);
        let body = serde_json::to_vec(&json!({
            "target": peer.id,
            "params": payload,
        }))
        .map_err(|e| unreachable(format!("encode request: {e}")))?;
        let signature = self.credentials.sign(&body);

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(RELAY_KEY_HEADER, self.credentials.hotkey().as_str())
            .header(RELAY_SIGNATURE_HEADER, signature)
            .body(body)
            .send()
            .await
            .map_err(|e| unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(unreachable(format!("HTTP {status}")));
        }
        let reply: Value = response
            .json()
            .await
            .map_err(|e| unreachable(format!("bad reply: {e}")))?;
        Ok(extract_answer(reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_answer_field() {
        assert_eq!(extract_answer(json!({"answer": "42", "x": 1})), json!("42"));
        assert_eq!(extract_answer(json!({"other": 1})), json!({"other": 1}));
        assert_eq!(extract_answer(json!("plain")), json!("plain"));
    }
}
