//! reqwest-backed transport for the JSON Ledger API.

use std::time::Duration;

use async_trait::async_trait;
use lance_types::LedgerMode;
use reqwest::Client;
use serde_json::Value;

use crate::error::{LedgerError, LedgerResult};
use crate::transport::{HttpMethod, LedgerRequest, LedgerTransport};

/// HTTP transport for one ledger endpoint.
///
/// Sandbox ledgers run without auth, so no `Authorization` header is sent in
/// [`LedgerMode::Local`]; remote ledgers get `Bearer <token>` for the acting
/// identity.
pub struct HttpTransport {
    base_url: String,
    mode: LedgerMode,
    client: Client,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, mode: LedgerMode, timeout: Duration) -> LedgerResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::Network(format!("failed to build HTTP client: {e}")))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            base_url,
            mode,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn mode(&self) -> LedgerMode {
        self.mode
    }
}

#[async_trait]
impl LedgerTransport for HttpTransport {
    async fn send(&self, request: LedgerRequest) -> LedgerResult<Value> {
        let url = format!("{}{}", self.base_url, request.endpoint);
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&url),
            HttpMethod::Post => self.client.post(&url),
        };

        if !self.mode.is_sandbox() {
            if let Some(token) = request.token.as_deref() {
                builder = builder.bearer_auth(token);
            }
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(%url, status = status.as_u16(), "ledger request rejected");
            return Err(LedgerError::Transport {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await.map_err(map_reqwest_error)?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| LedgerError::InvalidResponse(e.to_string()))
    }
}

fn map_reqwest_error(error: reqwest::Error) -> LedgerError {
    if error.is_timeout() {
        LedgerError::Timeout(error.to_string())
    } else {
        LedgerError::Network(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoints;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport(server: &MockServer, mode: LedgerMode) -> HttpTransport {
        HttpTransport::new(server.uri(), mode, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn sandbox_mode_sends_no_authorization() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(endpoints::LEDGER_END))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"offset": 7})))
            .expect(1)
            .mount(&server)
            .await;

        let value = transport(&server, LedgerMode::Local)
            .send(LedgerRequest::get(endpoints::LEDGER_END).with_token("tok"))
            .await
            .unwrap();
        assert_eq!(value["offset"], 7);

        let requests = server.received_requests().await.unwrap();
        assert!(requests[0].headers.get("authorization").is_none());
    }

    #[tokio::test]
    async fn devnet_mode_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(endpoints::ACTIVE_CONTRACTS))
            .and(header("authorization", "Bearer secret"))
            .and(body_json(json!({"verbose": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let value = transport(&server, LedgerMode::Devnet)
            .send(LedgerRequest::post(endpoints::ACTIVE_CONTRACTS, json!({"verbose": true})).with_token("secret"))
            .await
            .unwrap();
        assert_eq!(value, json!([]));
    }

    #[tokio::test]
    async fn non_success_maps_to_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(endpoints::SUBMIT_AND_WAIT))
            .respond_with(ResponseTemplate::new(403).set_body_string("PERMISSION_DENIED"))
            .mount(&server)
            .await;

        let err = transport(&server, LedgerMode::Devnet)
            .send(LedgerRequest::post(endpoints::SUBMIT_AND_WAIT, json!({})))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::Transport {
                status: 403,
                body: "PERMISSION_DENIED".into()
            }
        );
    }

    #[tokio::test]
    async fn slow_response_is_a_retryable_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(endpoints::LEDGER_END))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"offset": 1}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let transport =
            HttpTransport::new(server.uri(), LedgerMode::Local, Duration::from_millis(50)).unwrap();
        let err = transport
            .send(LedgerRequest::get(endpoints::LEDGER_END))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Timeout(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn empty_body_decodes_to_null() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(endpoints::USERS))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let value = transport(&server, LedgerMode::Local)
            .send(LedgerRequest::post(endpoints::USERS, json!({})))
            .await
            .unwrap();
        assert!(value.is_null());
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let t = HttpTransport::new("http://localhost:6870/", LedgerMode::Local, Duration::from_secs(1)).unwrap();
        assert_eq!(t.base_url(), "http://localhost:6870");
        assert_eq!(t.mode(), LedgerMode::Local);
    }
}
