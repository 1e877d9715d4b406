use relay_source::SourceCfg;
use std::collections::HashMap;

/// All relay service parameters. Loaded from `RELAY_*` environment variables;
/// any key that is missing or fails to parse keeps its default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayCfg {
    /// Shared secret every request must present.
    pub api_key: String,
    pub bind_addr: String,

    // evaluation
    pub recent_window_minutes: u32,

    // shutdown
    pub shutdown_timeout_secs: u64,

    // upstream monitoring service
    pub source: SourceCfg,
}

impl Default for RelayCfg {
    fn default() -> Self {
        Self {
            api_key: "MINHA_CHAVE".to_owned(),
            bind_addr: "0.0.0.0:5000".to_owned(),
            recent_window_minutes: 30,
            shutdown_timeout_secs: 10,
            source: SourceCfg::default(),
        }
    }
}

impl RelayCfg {
    /// Load config from the process environment.
    pub fn from_env() -> Self {
        let map: HashMap<String, String> = std::env::vars().collect();
        Self::from_map(&map)
    }

    pub fn from_map(m: &HashMap<String, String>) -> Self {
        let d = Self::default();
        Self {
            api_key: get_or(m, "RELAY_API_KEY", d.api_key),
            bind_addr: get_or(m, "RELAY_BIND_ADDR", d.bind_addr),
            recent_window_minutes: get_or(
                m,
                "RELAY_RECENT_WINDOW_MINUTES",
                d.recent_window_minutes,
            ),
            shutdown_timeout_secs: get_or(
                m,
                "RELAY_SHUTDOWN_TIMEOUT_SECS",
                d.shutdown_timeout_secs,
            ),
            source: SourceCfg {
                base_url: get_or(m, "RELAY_SOURCE_BASE_URL", d.source.base_url),
                api_key: m.get("RELAY_SOURCE_API_KEY").filter(|v| !v.is_empty()).cloned(),
                recent_timeout_secs: get_or(
                    m,
                    "RELAY_SOURCE_RECENT_TIMEOUT_SECS",
                    d.source.recent_timeout_secs,
                ),
                range_timeout_secs: get_or(
                    m,
                    "RELAY_SOURCE_RANGE_TIMEOUT_SECS",
                    d.source.range_timeout_secs,
                ),
            },
        }
    }

    /// Effective settings for the startup log. Secrets are reported as set/unset only.
    pub fn to_entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("api_key", redact(Some(&self.api_key))),
            ("bind_addr", self.bind_addr.clone()),
            ("recent_window_minutes", self.recent_window_minutes.to_string()),
            ("shutdown_timeout_secs", self.shutdown_timeout_secs.to_string()),
            ("source.base_url", self.source.base_url.clone()),
            ("source.api_key", redact(self.source.api_key.as_ref())),
            ("source.recent_timeout_secs", self.source.recent_timeout_secs.to_string()),
            ("source.range_timeout_secs", self.source.range_timeout_secs.to_string()),
        ]
    }
}

fn get_or<T: std::str::FromStr>(map: &HashMap<String, String>, key: &str, default: T) -> T {
    map.get(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn redact(secret: Option<&String>) -> String {
    match secret {
        Some(s) if !s.is_empty() => "<set>".to_owned(),
        _ => "<unset>".to_owned(),
    }
}
