//! HTTP-based sample source.
//!
//! Talks to a monitoring service exposing two JSON endpoints:
//! `GET {base}/samples/recent?minutes=N` and
//! `GET {base}/samples/range?start=S&end=E`, both answering
//! `{ "labels": [...], "values": [...] }`.

use crate::provider::{RangeSamples, SampleSource, SourceError, SourceFuture};
use serde::Deserialize;
use std::time::Duration;

/// Connection settings for the monitoring service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCfg {
    pub base_url: String,
    /// Sent as `X-API-Key` when set.
    pub api_key: Option<String>,
    pub recent_timeout_secs: u64,
    pub range_timeout_secs: u64,
}

impl Default for SourceCfg {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_owned(),
            api_key: None,
            recent_timeout_secs: 5,
            range_timeout_secs: 10,
        }
    }
}

// ── wire types ──

/// Series payload. Entries stay untyped so that nulls and numeric strings
/// can be filtered instead of failing the whole decode.
#[derive(Deserialize)]
struct SeriesResponse {
    #[serde(default)]
    labels: Vec<serde_json::Value>,
    #[serde(default, alias = "data")]
    values: Vec<serde_json::Value>,
}

impl SeriesResponse {
    /// Drop non-numeric readings, taking the aligned label with them.
    fn into_range(self) -> RangeSamples {
        let mut labels = Vec::with_capacity(self.values.len());
        let mut values = Vec::with_capacity(self.values.len());
        for (i, raw) in self.values.iter().enumerate() {
            let Some(value) = numeric(raw) else {
                continue;
            };
            labels.push(self.labels.get(i).and_then(label));
            values.push(value);
        }
        RangeSamples { labels, values }
    }
}

fn numeric(raw: &serde_json::Value) -> Option<f64> {
    let value = match raw {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    value.is_finite().then_some(value)
}

fn label(raw: &serde_json::Value) -> Option<String> {
    match raw {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ── Source ──

/// HTTP-backed sample source.
pub struct HttpSource {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    recent_timeout: Duration,
    range_timeout: Duration,
}

impl HttpSource {
    pub fn from_cfg(cfg: &SourceCfg) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: cfg.base_url.trim_end_matches('/').to_owned(),
            api_key: cfg.api_key.clone().filter(|k| !k.is_empty()),
            recent_timeout: Duration::from_secs(cfg.recent_timeout_secs),
            range_timeout: Duration::from_secs(cfg.range_timeout_secs),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/samples/{path}", self.base_url)
    }

    async fn get_series(
        &self,
        path: &str,
        query: &[(&str, String)],
        timeout: Duration,
    ) -> Result<RangeSamples, SourceError> {
        let mut req = self.client.get(self.endpoint(path)).query(query).timeout(timeout);
        if let Some(key) = &self.api_key {
            req = req.header("X-API-Key", key);
        }

        let resp = req.send().await.map_err(transport_error)?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(SourceError::BadStatus { status, body });
        }

        let series: SeriesResponse = resp.json().await.map_err(|e| {
            if e.is_timeout() {
                SourceError::Timeout
            } else {
                SourceError::Decode(e.to_string())
            }
        })?;
        Ok(series.into_range())
    }
}

fn transport_error(e: reqwest::Error) -> SourceError {
    if e.is_timeout() {
        SourceError::Timeout
    } else {
        SourceError::RequestFailed(e.to_string())
    }
}

impl SampleSource for HttpSource {
    fn name(&self) -> &str {
        "http"
    }

    fn fetch_recent(&self, window_minutes: u32) -> SourceFuture<'_, Vec<f64>> {
        Box::pin(async move {
            let query = [("minutes", window_minutes.to_string())];
            let series = self.get_series("recent", &query, self.recent_timeout).await?;
            tracing::debug!(
                source = "http",
                samples = series.len(),
                window_minutes,
                "recent samples fetched"
            );
            Ok(series.values)
        })
    }

    fn fetch_range<'a>(&'a self, start: &'a str, end: &'a str) -> SourceFuture<'a, RangeSamples> {
        Box::pin(async move {
            let query = [("start", start.to_owned()), ("end", end.to_owned())];
            let series = self.get_series("range", &query, self.range_timeout).await?;
            tracing::debug!(
                source = "http",
                samples = series.len(),
                start,
                end,
                "range samples fetched"
            );
            Ok(series)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(body: serde_json::Value) -> RangeSamples {
        serde_json::from_value::<SeriesResponse>(body).unwrap().into_range()
    }

    #[test]
    fn drops_nulls_and_non_numeric_in_lockstep() {
        let samples = decode(json!({
            "labels": ["t0", "t1", "t2", "t3"],
            "values": [10.0, null, "x", 25.5],
        }));
        assert_eq!(samples.values, vec![10.0, 25.5]);
        assert_eq!(samples.labels, vec![Some("t0".to_owned()), Some("t3".to_owned())]);
    }

    #[test]
    fn accepts_numeric_strings() {
        let samples = decode(json!({ "labels": ["a", "b"], "values": ["12", " 7.5 "] }));
        assert_eq!(samples.values, vec![12.0, 7.5]);
    }

    #[test]
    fn missing_labels_become_none() {
        let samples = decode(json!({ "values": [1, 2] }));
        assert_eq!(samples.values, vec![1.0, 2.0]);
        assert_eq!(samples.labels, vec![None, None]);
    }

    #[test]
    fn data_alias_is_accepted() {
        let samples = decode(json!({ "labels": ["a"], "data": [3] }));
        assert_eq!(samples.values, vec![3.0]);
    }

    #[test]
    fn non_finite_strings_are_dropped() {
        let samples = decode(json!({ "values": ["NaN", "inf", 4] }));
        assert_eq!(samples.values, vec![4.0]);
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        let cfg = SourceCfg { base_url: "http://pm.local/api/".into(), ..SourceCfg::default() };
        let source = HttpSource::from_cfg(&cfg);
        assert_eq!(source.endpoint("recent"), "http://pm.local/api/samples/recent");
        assert_eq!(source.name(), "http");
    }

    #[test]
    fn empty_api_key_is_not_sent() {
        let cfg = SourceCfg { api_key: Some(String::new()), ..SourceCfg::default() };
        let source = HttpSource::from_cfg(&cfg);
        assert!(source.api_key.is_none());
    }

    #[test]
    fn default_timeouts() {
        let cfg = SourceCfg::default();
        let source = HttpSource::from_cfg(&cfg);
        assert_eq!(source.recent_timeout, Duration::from_secs(5));
        assert_eq!(source.range_timeout, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn unreachable_upstream_is_an_error() {
        let cfg = SourceCfg {
            base_url: "http://127.0.0.1:9".into(),
            recent_timeout_secs: 1,
            ..SourceCfg::default()
        };
        let source = HttpSource::from_cfg(&cfg);
        assert!(source.fetch_recent(5).await.is_err());
    }
}
