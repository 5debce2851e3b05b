//! HTTP client for a browser automation bridge.
//!
//! The bridge lists the browser sessions (tabs) it can drive and executes
//! order-form actions inside a given session:
//! - `GET  /sessions` → `[{"id": "...", "url": "..."}]`
//! - `POST /sessions/{id}/invoke` with `{"action": "...", "args": {...}}`
//!   → `{"ok": true, "value": ...}` or `{"ok": false, "error": "..."}`
//!
//! Sessions are assigned to venues by matching their URL against each venue's
//! trading page.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use super::traits::{SessionLocator, VenueAdapter};
use super::types::{Direction, RawPosition, Venue};
use crate::config::{BridgeConfig, VenuesConfig};

/// A session as reported by the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BridgeSessionInfo {
    pub id: String,
    pub url: String,
}

/// Action sent to `/sessions/{id}/invoke`.
#[derive(Debug, Serialize)]
#[serde(tag = "action", content = "args", rename_all = "camelCase")]
enum BridgeAction<'a> {
    GetPosition { symbol: &'a str },
    GetAccountValue,
    SetQuantity { quantity: &'a str },
    SelectDirection { direction: Direction },
    SelectImmediateExecution,
    Submit,
    SelectOrderBookLevel { direction: Direction, index: usize },
    Navigate { url: String },
}

#[derive(Debug, Deserialize)]
struct InvokeReply {
    ok: bool,
    #[serde(default)]
    value: serde_json::Value,
    #[serde(default)]
    error: Option<String>,
}

/// Position row as scraped by the bridge.
#[derive(Debug, Deserialize)]
struct BridgePosition {
    coin: String,
    position: String,
}

#[derive(Debug, Clone)]
struct Transport {
    client: Client,
    base_url: String,
}

/// Locates venue sessions through the bridge.
#[derive(Debug, Clone)]
pub struct BridgeLocator {
    transport: Transport,
    venues: VenuesConfig,
}

impl BridgeLocator {
    /// Create a locator for the bridge at `config.base_url`.
    pub fn new(config: &BridgeConfig, venues: &VenuesConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            transport: Transport {
                client,
                base_url: config.base_url.trim_end_matches('/').to_string(),
            },
            venues: venues.clone(),
        })
    }

    /// List every session the bridge knows about.
    #[instrument(skip(self), name = "bridge_list_sessions")]
    pub async fn list_sessions(&self) -> Result<Vec<BridgeSessionInfo>> {
        let url = format!("{}/sessions", self.transport.base_url);
        let response = self
            .transport
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to reach automation bridge")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Bridge error {}: {}", status, body);
        }

        let sessions: Vec<BridgeSessionInfo> = response
            .json()
            .await
            .context("Failed to parse session list")?;

        debug!("Bridge reports {} sessions", sessions.len());
        Ok(sessions)
    }

    /// Which venue a session URL belongs to, if any.
    pub fn venue_for_url(&self, url: &str) -> Option<Venue> {
        Venue::ALL
            .into_iter()
            .find(|venue| url.contains(self.venues.page_pattern(*venue)))
    }
}

#[async_trait]
impl SessionLocator for BridgeLocator {
    async fn locate(&self, venue: Venue) -> Result<Option<Arc<dyn VenueAdapter>>> {
        let sessions = self.list_sessions().await?;
        let found = sessions
            .into_iter()
            .find(|session| self.venue_for_url(&session.url) == Some(venue));

        Ok(found.map(|session| {
            Arc::new(BridgeSession {
                transport: self.transport.clone(),
                session_id: session.id,
                venue,
                trade_url: self.venues.trade_url(venue).to_string(),
            }) as Arc<dyn VenueAdapter>
        }))
    }
}

/// One venue session driven through the bridge.
#[derive(Debug, Clone)]
pub struct BridgeSession {
    transport: Transport,
    session_id: String,
    venue: Venue,
    trade_url: String,
}

impl BridgeSession {
    #[instrument(skip(self, action), fields(venue = %self.venue, session = %self.session_id))]
    async fn invoke(&self, action: BridgeAction<'_>) -> Result<serde_json::Value> {
        let url = format!(
            "{}/sessions/{}/invoke",
            self.transport.base_url,
            urlencoding::encode(&self.session_id)
        );

        let response = self
            .transport
            .client
            .post(&url)
            .json(&action)
            .send()
            .await
            .context("Failed to reach automation bridge")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Bridge error {}: {}", status, body);
        }

        let reply: InvokeReply = response
            .json()
            .await
            .context("Failed to parse bridge reply")?;

        if !reply.ok {
            bail!(
                "{}",
                reply.error.unwrap_or_else(|| "bridge rejected the call".to_string())
            );
        }

        Ok(reply.value)
    }
}

#[async_trait]
impl VenueAdapter for BridgeSession {
    fn venue(&self) -> Venue {
        self.venue
    }

    async fn get_position(&self, symbol: &str) -> Result<Option<RawPosition>> {
        let value = self.invoke(BridgeAction::GetPosition { symbol }).await?;
        if value.is_null() {
            return Ok(None);
        }

        let row: BridgePosition =
            serde_json::from_value(value).context("Unexpected position payload")?;
        if !row.coin.trim().eq_ignore_ascii_case(symbol.trim()) {
            debug!(requested = %symbol, shown = %row.coin, "Position row is for another coin");
            return Ok(None);
        }
        Ok(Some(RawPosition::new(row.coin, row.position)))
    }

    async fn get_account_value(&self) -> Result<Option<String>> {
        let value = self.invoke(BridgeAction::GetAccountValue).await?;
        Ok(match value {
            serde_json::Value::Null => None,
            serde_json::Value::String(text) => Some(text),
            other => Some(other.to_string()),
        })
    }

    async fn set_quantity(&self, value: &str) -> Result<()> {
        self.invoke(BridgeAction::SetQuantity { quantity: value })
            .await
            .map(|_| ())
    }

    async fn select_direction(&self, direction: Direction) -> Result<()> {
        self.invoke(BridgeAction::SelectDirection { direction })
            .await
            .map(|_| ())
    }

    async fn select_immediate_execution_mode(&self) -> Result<()> {
        self.invoke(BridgeAction::SelectImmediateExecution)
            .await
            .map(|_| ())
    }

    async fn submit(&self) -> Result<()> {
        self.invoke(BridgeAction::Submit).await.map(|_| ())
    }

    async fn select_order_book_level(&self, direction: Direction, index: usize) -> Result<()> {
        self.invoke(BridgeAction::SelectOrderBookLevel { direction, index })
            .await
            .map(|_| ())
    }

    async fn navigate_to_symbol(&self, symbol: &str) -> Result<()> {
        let url = format!(
            "{}{}",
            self.trade_url,
            urlencoding::encode(&symbol.to_uppercase())
        );
        self.invoke(BridgeAction::Navigate { url }).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn locator_for(server: &MockServer) -> BridgeLocator {
        let config = BridgeConfig {
            base_url: server.uri(),
            timeout_secs: 5,
        };
        BridgeLocator::new(&config, &VenuesConfig::default()).unwrap()
    }

    async fn mount_sessions(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/sessions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": "3", "url": "https://example.com/" },
                { "id": "7", "url": "https://app.lighter.xyz/trade/BTC" },
            ])))
            .mount(server)
            .await;
    }

    #[test]
    fn test_action_encoding() {
        let encoded = serde_json::to_value(BridgeAction::SetQuantity { quantity: "0.20000" }).unwrap();
        assert_eq!(encoded, json!({ "action": "setQuantity", "args": { "quantity": "0.20000" } }));

        let encoded = serde_json::to_value(BridgeAction::Submit).unwrap();
        assert_eq!(encoded, json!({ "action": "submit" }));
    }

    #[tokio::test]
    async fn test_locate_matches_by_url() {
        let server = MockServer::start().await;
        mount_sessions(&server).await;
        let locator = locator_for(&server).await;

        let lighter = locator.locate(Venue::Lighter).await.unwrap();
        assert_eq!(lighter.map(|s| s.venue()), Some(Venue::Lighter));
        assert!(locator.locate(Venue::Variational).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_position_via_bridge() {
        let server = MockServer::start().await;
        mount_sessions(&server).await;
        Mock::given(method("POST"))
            .and(path("/sessions/7/invoke"))
            .and(body_partial_json(json!({ "action": "getPosition" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "value": { "coin": "BTC", "position": "-0.3" }
            })))
            .mount(&server)
            .await;

        let locator = locator_for(&server).await;
        let session = locator.locate(Venue::Lighter).await.unwrap().unwrap();
        let position = session.get_position("BTC").await.unwrap();
        assert_eq!(position, Some(RawPosition::new("BTC", "-0.3")));
    }

    #[tokio::test]
    async fn test_position_for_other_coin_is_absent() {
        let server = MockServer::start().await;
        mount_sessions(&server).await;
        Mock::given(method("POST"))
            .and(path("/sessions/7/invoke"))
            .and(body_partial_json(json!({ "action": "getPosition" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "value": { "coin": "ETH", "position": "2.5" }
            })))
            .mount(&server)
            .await;

        let locator = locator_for(&server).await;
        let session = locator.locate(Venue::Lighter).await.unwrap().unwrap();
        assert_eq!(session.get_position("BTC").await.unwrap(), None);
        assert_eq!(
            session.get_position("eth").await.unwrap(),
            Some(RawPosition::new("ETH", "2.5"))
        );
    }

    #[tokio::test]
    async fn test_rejected_call_is_an_error() {
        let server = MockServer::start().await;
        mount_sessions(&server).await;
        Mock::given(method("POST"))
            .and(path("/sessions/7/invoke"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": false,
                "error": "submit button not found"
            })))
            .mount(&server)
            .await;

        let locator = locator_for(&server).await;
        let session = locator.locate(Venue::Lighter).await.unwrap().unwrap();
        let err = session.submit().await.unwrap_err();
        assert!(err.to_string().contains("submit button not found"));
    }

    #[tokio::test]
    async fn test_navigate_builds_trade_url() {
        let server = MockServer::start().await;
        mount_sessions(&server).await;
        Mock::given(method("POST"))
            .and(path("/sessions/7/invoke"))
            .and(body_partial_json(json!({
                "action": "navigate",
                "args": { "url": "https://app.lighter.xyz/trade/ETH" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
            .expect(1)
            .mount(&server)
            .await;

        let locator = locator_for(&server).await;
        let session = locator.locate(Venue::Lighter).await.unwrap().unwrap();
        session.navigate_to_symbol("eth").await.unwrap();
    }
}
