//! Interactive Brokers Client Portal gateway as a live feed
//!
//! The gateway runs locally with a self-signed certificate and must already
//! be logged in; this feed only checks the session and reads market data.
//!
//! One gateway serves every symbol being analyzed, so each live session keeps
//! its own list of snapshot subscriptions and releases only those.

use crate::error::{Result, StockError};
use crate::history::{LiveFeed, LiveSession};
use crate::models::PriceBar;
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

/// Snapshot field for implied volatility, reported like `"27.4%"`
const IMPLIED_VOL_FIELD: &str = "7283";

/// Snapshot requests per symbol, the first only opens the subscription
const SNAPSHOT_ATTEMPTS: u32 = 5;
const SNAPSHOT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Contract ids with an open snapshot subscription, keyed by session id
#[derive(Debug, Clone, Default)]
struct Subscriptions(Arc<Mutex<HashMap<String, BTreeSet<i64>>>>);

impl Subscriptions {
    async fn record(&self, session_id: &str, conid: i64) {
        self.0
            .lock()
            .await
            .entry(session_id.to_string())
            .or_default()
            .insert(conid);
    }

    async fn release(&self, session_id: &str) -> BTreeSet<i64> {
        self.0.lock().await.remove(session_id).unwrap_or_default()
    }
}

/// Client Portal live feed
#[derive(Debug, Clone)]
pub struct IbkrLiveFeed {
    client: Client,
    subscriptions: Subscriptions,
}

#[derive(Debug, Deserialize)]
struct AuthStatus {
    #[serde(default)]
    authenticated: bool,
    #[serde(default)]
    connected: bool,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    data: Vec<HistoryBar>,
}

#[derive(Debug, Deserialize)]
struct HistoryBar {
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    #[serde(default)]
    v: f64,
    /// Epoch milliseconds
    t: i64,
}

impl IbkrLiveFeed {
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .danger_accept_invalid_certs(true) // gateway uses a self-signed cert
            .build()?;
        Ok(Self {
            client,
            subscriptions: Subscriptions::default(),
        })
    }

    async fn get_json(&self, url: String) -> Result<Value> {
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(StockError::BrokerError(format!("{status}: {text}")));
        }
        Ok(response.json().await?)
    }

    /// Resolve a stock symbol to a contract id
    async fn resolve_conid(&self, session: &LiveSession, symbol: &str) -> Result<i64> {
        let url = format!("{}/iserver/secdef/search", session.endpoint);
        let response = self
            .client
            .post(&url)
            .json(&json!({ "symbol": symbol, "secType": "STK" }))
            .send()
            .await?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(StockError::BrokerError(format!(
                "contract search failed: {text}"
            )));
        }

        let contracts: Value = response.json().await?;
        parse_conid(&contracts, symbol)
            .ok_or_else(|| StockError::InvalidSymbol(symbol.to_string()))
    }
}

#[async_trait]
impl LiveFeed for IbkrLiveFeed {
    #[instrument(skip(self))]
    async fn connect(&self, endpoint: &str, session_id: &str) -> Result<LiveSession> {
        let endpoint = endpoint.trim_end_matches('/');
        let body = self
            .get_json(format!("{endpoint}/iserver/auth/status"))
            .await?;
        let status: AuthStatus = serde_json::from_value(body)?;

        if !status.authenticated || !status.connected {
            return Err(StockError::BrokerError(
                "gateway session is not authenticated".to_string(),
            ));
        }

        debug!("Gateway session authenticated");
        Ok(LiveSession {
            endpoint: endpoint.to_string(),
            session_id: session_id.to_string(),
        })
    }

    #[instrument(skip(self, session), fields(session_id = %session.session_id))]
    async fn query(
        &self,
        session: &LiveSession,
        symbol: &str,
        lookback_days: u32,
    ) -> Result<Vec<PriceBar>> {
        let conid = self.resolve_conid(session, symbol).await?;
        let url = format!(
            "{}/iserver/marketdata/history?conid={conid}&period={}&bar=1d&outsideRth=false",
            session.endpoint,
            history_period(lookback_days)
        );
        let body = self.get_json(url).await?;
        parse_history(body)
    }

    #[instrument(skip(self, session), fields(session_id = %session.session_id))]
    async fn implied_volatility(&self, session: &LiveSession, symbol: &str) -> Result<Option<f64>> {
        let conid = self.resolve_conid(session, symbol).await?;
        self.subscriptions.record(&session.session_id, conid).await;

        let url = format!(
            "{}/iserver/marketdata/snapshot?conids={conid}&fields={IMPLIED_VOL_FIELD}",
            session.endpoint
        );
        poll_snapshot(SNAPSHOT_ATTEMPTS, SNAPSHOT_POLL_INTERVAL, || {
            self.get_json(url.clone())
        })
        .await
    }

    async fn disconnect(&self, session: LiveSession) -> Result<()> {
        let conids = self.subscriptions.release(&session.session_id).await;
        let url = format!("{}/iserver/marketdata/unsubscribe", session.endpoint);

        let mut failed = Vec::new();
        for conid in &conids {
            let outcome = self
                .client
                .post(&url)
                .json(&json!({ "conid": conid }))
                .send()
                .await
                .and_then(reqwest::Response::error_for_status);
            if let Err(e) = outcome {
                warn!(conid = *conid, error = %e, "Unsubscribe failed");
                failed.push(conid.to_string());
            }
        }

        debug!(
            session_id = %session.session_id,
            released = conids.len(),
            "Live session released"
        );
        if failed.is_empty() {
            Ok(())
        } else {
            Err(StockError::BrokerError(format!(
                "could not unsubscribe conids {}",
                failed.join(", ")
            )))
        }
    }
}

/// Request a snapshot until the implied volatility field shows up
///
/// The gateway answers the first request for a conid without the field while
/// it sets up the subscription.
async fn poll_snapshot<F, Fut>(attempts: u32, interval: Duration, mut request: F) -> Result<Option<f64>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Value>>,
{
    for attempt in 0..attempts.max(1) {
        if attempt > 0 {
            tokio::time::sleep(interval).await;
        }
        let body = request().await?;
        if let Some(iv) = parse_implied_volatility(&body) {
            return Ok(Some(iv));
        }
        debug!(attempt, "Snapshot field not populated yet");
    }
    Ok(None)
}

/// Gateway period string for a lookback in days
fn history_period(lookback_days: u32) -> String {
    if lookback_days >= 365 && lookback_days % 365 == 0 {
        format!("{}y", lookback_days / 365)
    } else {
        format!("{lookback_days}d")
    }
}

fn parse_conid(contracts: &Value, symbol: &str) -> Option<i64> {
    contracts
        .as_array()?
        .iter()
        .filter(|c| {
            c.get("symbol")
                .and_then(Value::as_str)
                .is_none_or(|s| s.eq_ignore_ascii_case(symbol))
        })
        .find_map(|c| match c.get("conid")? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        })
}

fn parse_history(body: Value) -> Result<Vec<PriceBar>> {
    let response: HistoryResponse = serde_json::from_value(body)?;
    Ok(response
        .data
        .into_iter()
        .filter_map(|bar| {
            let date = DateTime::from_timestamp_millis(bar.t)?.date_naive();
            Some(PriceBar {
                date,
                open: bar.o,
                high: bar.h,
                low: bar.l,
                close: bar.c,
                volume: bar.v.max(0.0) as u64,
            })
        })
        .collect())
}

/// Implied volatility as a fraction, from a snapshot like `[{"7283": "27.4%"}]`
fn parse_implied_volatility(body: &Value) -> Option<f64> {
    let raw = body.as_array()?.first()?.get(IMPLIED_VOL_FIELD)?;
    let pct = match raw {
        Value::String(s) => s.trim().trim_end_matches('%').parse::<f64>().ok()?,
        Value::Number(n) => n.as_f64()?,
        _ => return None,
    };
    Some(pct / 100.0).filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[test]
    fn test_history_period() {
        assert_eq!(history_period(365), "1y");
        assert_eq!(history_period(730), "2y");
        assert_eq!(history_period(90), "90d");
    }

    #[test]
    fn test_parse_conid() {
        let body = json!([
            {"conid": "265598", "symbol": "AAPL", "companyName": "APPLE INC"},
            {"conid": 38708077, "symbol": "AAPL", "companyName": "APPLE INC (MEXI)"}
        ]);
        assert_eq!(parse_conid(&body, "aapl"), Some(265_598));
        assert_eq!(parse_conid(&json!([]), "AAPL"), None);
    }

    #[test]
    fn test_parse_history() {
        let body = json!({
            "symbol": "AAPL",
            "data": [
                {"o": 189.0, "c": 190.5, "h": 191.2, "l": 188.1, "v": 52_000_000.0, "t": 1_704_205_800_000_i64},
                {"o": 190.5, "c": 185.6, "h": 190.9, "l": 184.3, "v": 61_000_000.0, "t": 1_704_292_200_000_i64}
            ]
        });

        let bars = parse_history(body).unwrap();

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, 190.5);
        assert_eq!(bars[1].volume, 61_000_000);
        assert!(bars[0].date < bars[1].date);
    }

    #[test]
    fn test_parse_history_without_data() {
        assert!(parse_history(json!({"symbol": "AAPL"})).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_poll_snapshot_waits_for_field() {
        let mut replies = VecDeque::from(vec![
            json!([{"conid": 265_598, "_updated": 1_712_000_000_000_i64}]),
            json!([{"conid": 265_598}]),
            json!([{"conid": 265_598, "7283": "31.2%"}]),
        ]);
        let mut calls = 0;

        let iv = poll_snapshot(5, Duration::from_millis(1), || {
            calls += 1;
            let reply = replies.pop_front();
            async move { reply.ok_or_else(|| StockError::BrokerError("no reply".to_string())) }
        })
        .await
        .unwrap();

        assert_eq!(calls, 3);
        assert!((iv.unwrap() - 0.312).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_poll_snapshot_gives_up() {
        let mut calls = 0;
        let iv = poll_snapshot(3, Duration::from_millis(1), || {
            calls += 1;
            async { Ok(json!([{"conid": 265_598}])) }
        })
        .await
        .unwrap();

        assert_eq!(calls, 3);
        assert_eq!(iv, None);
    }

    #[tokio::test]
    async fn test_poll_snapshot_propagates_errors() {
        let result = poll_snapshot(3, Duration::from_millis(1), || async {
            Err::<Value, _>(StockError::BrokerError("no bridge".to_string()))
        })
        .await;

        assert!(matches!(result, Err(StockError::BrokerError(_))));
    }

    #[tokio::test]
    async fn test_sessions_release_only_their_own_subscriptions() {
        let subscriptions = Subscriptions::default();
        subscriptions.record("session-a", 265_598).await;
        subscriptions.record("session-b", 272_093).await;
        subscriptions.record("session-a", 265_598).await;

        let released = subscriptions.release("session-a").await;

        assert_eq!(released, BTreeSet::from([265_598]));
        assert_eq!(
            subscriptions.release("session-b").await,
            BTreeSet::from([272_093])
        );
        assert!(subscriptions.release("session-a").await.is_empty());
    }

    #[test]
    fn test_parse_implied_volatility() {
        let body = json!([{"conid": 265_598, "7283": "27.4%"}]);
        let iv = parse_implied_volatility(&body).unwrap();
        assert!((iv - 0.274).abs() < 1e-9);

        assert_eq!(parse_implied_volatility(&json!([{"conid": 265_598}])), None);
    }
}
