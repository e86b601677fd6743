use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::db;

pub const SETTINGS_KEY: &str = "reports.engine";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Applied when a request omits `term`.
    pub current_term: String,
    /// Applied when a request omits `session`.
    pub current_session: String,
    pub ca_max_score: f64,
    pub term_max_score: f64,
    pub pass_mark: f64,
    pub report_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            current_term: "First Term".to_string(),
            current_session: "2025/2026".to_string(),
            ca_max_score: 20.0,
            term_max_score: 100.0,
            pass_mark: 40.0,
            report_timeout_ms: 30_000,
        }
    }
}

impl EngineConfig {
    pub fn report_timeout(&self) -> Duration {
        Duration::from_millis(self.report_timeout_ms)
    }

    pub fn load(conn: &Connection) -> anyhow::Result<Self> {
        match db::settings_get_json(conn, SETTINGS_KEY)? {
            Some(v) => Ok(serde_json::from_value(v)?),
            None => Ok(Self::default()),
        }
    }

    pub fn save(&self, conn: &Connection) -> anyhow::Result<()> {
        db::settings_set_json(conn, SETTINGS_KEY, &serde_json::to_value(self)?)
    }

    /// Overlays the keys present in `patch` onto this config.
    pub fn merged(&self, patch: &serde_json::Value) -> anyhow::Result<Self> {
        let Some(obj) = patch.as_object() else {
            anyhow::bail!("config patch must be an object");
        };
        let mut base = serde_json::to_value(self)?;
        if let Some(base_obj) = base.as_object_mut() {
            for (k, v) in obj {
                if !base_obj.contains_key(k) {
                    anyhow::bail!("unknown config key: {}", k);
                }
                base_obj.insert(k.clone(), v.clone());
            }
        }
        let next: EngineConfig = serde_json::from_value(base)?;
        if next.ca_max_score <= 0.0 || next.term_max_score <= 0.0 {
            anyhow::bail!("max scores must be positive");
        }
        Ok(next)
    }
}
