use std::{env, path::PathBuf, time::Duration as StdDuration};

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::services::termination::RetryPolicy;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GlobalConfig {
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub finalize: FinalizeConfig,
    pub storage: StorageConfig,
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    pub duration_sec: i64,
    pub tick_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FinalizeConfig {
    pub immediate_attempts: u32,
    pub recovery_attempts: u32,
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    pub session_store_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
    pub firestore_project_id: Option<String>,
    pub firestore_base_url: String,
    #[serde(skip_serializing)]
    pub auth_token: Option<String>,
    pub timeout_ms: u64,
}

impl GlobalConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let duration_sec = check_session_duration(
            env::var("SESSION_DURATION_SEC")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .unwrap_or(300),
        )?;

        Ok(GlobalConfig {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .or_else(|_| env::var("SERVER_PORT"))
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .unwrap_or(8080),
                cors_allowed_origins: env::var("CORS_ORIGINS")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            session: SessionConfig {
                duration_sec,
                tick_interval_ms: env::var("TICK_INTERVAL_MS")
                    .unwrap_or_else(|_| "1000".to_string())
                    .parse()
                    .unwrap_or(1000),
            },
            finalize: FinalizeConfig {
                immediate_attempts: env::var("FINALIZE_IMMEDIATE_ATTEMPTS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
                recovery_attempts: env::var("FINALIZE_RECOVERY_ATTEMPTS")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()
                    .unwrap_or(3),
                retry_delay_ms: env::var("FINALIZE_RETRY_DELAY_MS")
                    .unwrap_or_else(|_| "200".to_string())
                    .parse()
                    .unwrap_or(200),
            },
            storage: StorageConfig {
                session_store_path: env::var("SESSION_STORE_PATH")
                    .unwrap_or_else(|_| "./data/active_session.json".to_string())
                    .into(),
            },
            gateway: GatewayConfig {
                firestore_project_id: env::var("FIRESTORE_PROJECT_ID")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
                firestore_base_url: env::var("FIRESTORE_BASE_URL")
                    .unwrap_or_else(|_| "https://firestore.googleapis.com/v1".to_string()),
                auth_token: env::var("FIRESTORE_AUTH_TOKEN")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
                timeout_ms: env::var("GATEWAY_TIMEOUT_MS")
                    .unwrap_or_else(|_| "5000".to_string())
                    .parse()
                    .unwrap_or(5000),
            },
        })
    }
}

/// Longest countdown a session may run.
pub const MAX_SESSION_DURATION_SEC: i64 = 24 * 60 * 60;

fn check_session_duration(duration_sec: i64) -> anyhow::Result<i64> {
    if duration_sec <= 0 {
        anyhow::bail!("SESSION_DURATION_SEC must be positive, got {}", duration_sec);
    }
    if duration_sec > MAX_SESSION_DURATION_SEC {
        anyhow::bail!(
            "SESSION_DURATION_SEC must be at most {} (one day), got {}",
            MAX_SESSION_DURATION_SEC,
            duration_sec
        );
    }
    Ok(duration_sec)
}

/// Typed knobs the coordinator runs with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuardSettings {
    pub session_duration: Duration,
    pub immediate_policy: RetryPolicy,
    pub recovery_policy: RetryPolicy,
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self {
            session_duration: Duration::seconds(300),
            immediate_policy: RetryPolicy::new(5, StdDuration::from_millis(200)),
            recovery_policy: RetryPolicy::new(3, StdDuration::from_millis(200)),
        }
    }
}

impl From<&GlobalConfig> for GuardSettings {
    fn from(config: &GlobalConfig) -> Self {
        let delay = StdDuration::from_millis(config.finalize.retry_delay_ms);

        Self {
            session_duration: Duration::seconds(
                config
                    .session
                    .duration_sec
                    .clamp(1, MAX_SESSION_DURATION_SEC),
            ),
            immediate_policy: RetryPolicy::new(config.finalize.immediate_attempts, delay),
            recovery_policy: RetryPolicy::new(config.finalize.recovery_attempts, delay),
        }
    }
}
