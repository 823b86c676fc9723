//! Client for the broadcaster's `POST {base}/wallets/status` endpoint.
//!
//! The caller's bearer token is forwarded as-is. The verdict is read from
//! `results.mempool.ok`; a missing field counts as not ok.
use std::time::Duration;

use async_trait::async_trait;
use axum::http::header;
use serde::Deserialize;
use url::Url;

use super::client::{ValidatorError, WalletValidator};

#[derive(Debug, Clone)]
pub struct BroadcasterClient {
    http: reqwest::Client,
    status_url: Url,
}

#[derive(Debug, Default, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    results: StatusResults,
}

#[derive(Debug, Default, Deserialize)]
struct StatusResults {
    #[serde(default)]
    mempool: MempoolStatus,
}

#[derive(Debug, Default, Deserialize)]
struct MempoolStatus {
    #[serde(default)]
    ok: bool,
}

impl BroadcasterClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ValidatorError> {
        let status_url = status_url(base_url)?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self { http, status_url })
    }
}

fn status_url(base_url: &str) -> Result<Url, ValidatorError> {
    let mut base = Url::parse(base_url)?;
    // `join` replaces the last segment unless the base ends in '/'.
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base.join("wallets/status")?)
}

#[async_trait]
impl WalletValidator for BroadcasterClient {
    fn backend_name(&self) -> &'static str {
        "broadcaster"
    }

    async fn check(
        &self,
        address: &str,
        network: &str,
        auth_token: &str,
    ) -> Result<bool, ValidatorError> {
        let response = self
            .http
            .post(self.status_url.clone())
            .query(&[("address", address), ("network", network)])
            .bearer_auth(auth_token)
            .header(header::CONTENT_TYPE, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ValidatorError::Status(status));
        }

        let body: StatusResponse = response.json().await?;
        tracing::debug!(ok = body.results.mempool.ok, "wallet status received");
        Ok(body.results.mempool.ok)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::{
        Json, Router,
        extract::Query,
        http::{HeaderMap, StatusCode},
        routing::post,
    };
    use serde_json::{Value, json};

    use super::*;

    #[test]
    fn status_url_keeps_base_path() {
        assert_eq!(
            status_url("https://broadcast.example.com").unwrap().as_str(),
            "https://broadcast.example.com/wallets/status"
        );
        assert_eq!(
            status_url("https://broadcast.example.com/api").unwrap().as_str(),
            "https://broadcast.example.com/api/wallets/status"
        );
        assert_eq!(
            status_url("https://broadcast.example.com/api/").unwrap().as_str(),
            "https://broadcast.example.com/api/wallets/status"
        );
    }

    #[test]
    fn bad_base_url_is_rejected() {
        assert!(matches!(
            BroadcasterClient::new("not a url", Duration::from_secs(1)),
            Err(ValidatorError::Url(_))
        ));
    }

    #[test]
    fn missing_verdict_reads_as_not_ok() {
        let body: StatusResponse = serde_json::from_str(r#"{"results":{}}"#).unwrap();
        assert!(!body.results.mempool.ok);

        let body: StatusResponse =
            serde_json::from_str(r#"{"results":{"mempool":{"ok":true}}}"#).unwrap();
        assert!(body.results.mempool.ok);
    }

    async fn wallet_status(
        Query(params): Query<HashMap<String, String>>,
        headers: HeaderMap,
    ) -> Result<Json<Value>, StatusCode> {
        let bearer = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        if bearer != Some("Bearer session-token") {
            return Err(StatusCode::UNAUTHORIZED);
        }
        let ok = params.get("address").map(String::as_str) == Some("bc1qgood")
            && params.get("network").map(String::as_str) == Some("bitcoin");
        Ok(Json(json!({ "results": { "mempool": { "ok": ok } } })))
    }

    async fn spawn_broadcaster() -> String {
        let app = Router::new().route("/wallets/status", post(wallet_status));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn check_posts_address_network_and_bearer() {
        let base = spawn_broadcaster().await;
        let client = BroadcasterClient::new(&base, Duration::from_secs(5)).unwrap();

        assert!(
            client
                .check("bc1qgood", "bitcoin", "session-token")
                .await
                .unwrap()
        );
        assert!(
            !client
                .check("bc1qbad", "bitcoin", "session-token")
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let base = spawn_broadcaster().await;
        let client = BroadcasterClient::new(&base, Duration::from_secs(5)).unwrap();

        let err = client
            .check("bc1qgood", "bitcoin", "someone-else")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ValidatorError::Status(status) if status == StatusCode::UNAUTHORIZED
        ));
    }
}
