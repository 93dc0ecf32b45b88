use crate::models::{Observation, RoundId};
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// HTTP client for the game-result sources
pub struct UpstreamClient {
    client: Client,
}

impl UpstreamClient {
    pub fn new(timeout_ms: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Fetch the latest round from a source
    pub async fn fetch(&self, url: &str) -> Result<Observation> {
        let response = self.client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", url))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Upstream request failed: {} - {}", status, text));
        }

        let payload: Value = response.json().await
            .context("Failed to parse upstream response")?;

        Ok(parse_payload(&payload))
    }
}

/// Extract the round tuple from an upstream payload
///
/// Sources disagree on field names: the label is `ket_qua` or `result`, the
/// round id `phien_hien_tai` or `phien`. Missing or unusable fields are left
/// empty rather than failing the poll.
pub fn parse_payload(payload: &Value) -> Observation {
    let raw_label = first_field(payload, &["ket_qua", "result"])
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let round_id = first_field(payload, &["phien_hien_tai", "phien"]).and_then(RoundId::from_json);

    let total = payload.get("tong").and_then(as_small_int);

    let dice = match (
        payload.get("xuc_xac_1").and_then(as_small_int),
        payload.get("xuc_xac_2").and_then(as_small_int),
        payload.get("xuc_xac_3").and_then(as_small_int),
    ) {
        (Some(a), Some(b), Some(c)) => Some([a, b, c]),
        _ => None,
    };

    Observation {
        raw_label,
        round_id,
        total,
        dice,
        observed_at: Some(Utc::now()),
    }
}

/// First present, non-null, non-empty field among `keys`
fn first_field<'a>(payload: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| payload.get(*k))
        .find(|v| match v {
            Value::Null => false,
            Value::String(s) => !s.trim().is_empty(),
            _ => true,
        })
}

/// Numbers sent either as JSON numbers or numeric strings
fn as_small_int(value: &Value) -> Option<u8> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u8::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
