//! Config - 環境変数（と `.env`）からの設定読み込み
//!
//! 役割（alice / marcus）ごとに必要な変数が違うので、役割ごとに型を分けています。
//! 足りない必須変数は 1 つずつではなく、まとめて `ConfigError::Missing` で返します。

use std::str::FromStr;
use std::time::Duration;

use crate::app::AllowList;

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_CLASSIFIER_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_RESEARCH_MODEL: &str = "gemini-1.5-pro-002";
pub const DEFAULT_WORKER_AGENT: &str = "marcus";

/// Store HTTP timeout; not configurable.
const STORE_TIMEOUT: Duration = Duration::from_secs(30);

/// Telegram long-poll window.
const TELEGRAM_LONG_POLL: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<String>),

    #[error("invalid value for {key}={value:?}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub url: String,
    pub api_key: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationConfig {
    pub api_key: String,
    pub timeout: Duration,
}

/// Settings for the intake role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliceConfig {
    pub store: StoreConfig,
    pub generation: GenerationConfig,
    pub telegram_token: String,
    pub telegram_long_poll: Duration,
    pub allowed_user_ids: AllowList,
    pub classifier_model: String,
    pub agent: String,
}

/// Settings for the research worker role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarcusConfig {
    pub store: StoreConfig,
    pub generation: GenerationConfig,
    pub poll_interval: Duration,
    pub research_model: String,
    pub agent: String,
}

/// Settings needed only to read the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusConfig {
    pub store: StoreConfig,
    pub agent: String,
}

impl AliceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut env = Settings::new(&lookup);
        let store = env.store();
        let generation = env.generation()?;
        let telegram_token = env.required("TELEGRAM_TOKEN");
        let allowed_user_ids = env.allow_list("ALLOWED_USER_IDS")?;
        let classifier_model = env.string("CLASSIFIER_MODEL", DEFAULT_CLASSIFIER_MODEL);
        let agent = env.string("WORKER_AGENT", DEFAULT_WORKER_AGENT);
        env.finish()?;

        Ok(Self {
            store,
            generation,
            telegram_token,
            telegram_long_poll: TELEGRAM_LONG_POLL,
            allowed_user_ids,
            classifier_model,
            agent,
        })
    }
}

impl MarcusConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut env = Settings::new(&lookup);
        let store = env.store();
        let generation = env.generation()?;
        let poll_interval =
            Duration::from_secs(env.parse("POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?);
        let research_model = env.string("RESEARCH_MODEL", DEFAULT_RESEARCH_MODEL);
        let agent = env.string("WORKER_AGENT", DEFAULT_WORKER_AGENT);
        env.finish()?;

        if poll_interval.is_zero() {
            return Err(ConfigError::Invalid {
                key: "POLL_INTERVAL_SECS".to_string(),
                value: "0".to_string(),
                reason: "interval must be at least one second".to_string(),
            });
        }

        Ok(Self {
            store,
            generation,
            poll_interval,
            research_model,
            agent,
        })
    }
}

impl StatusConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut env = Settings::new(&lookup);
        let store = env.store();
        let agent = env.string("WORKER_AGENT", DEFAULT_WORKER_AGENT);
        env.finish()?;
        Ok(Self { store, agent })
    }
}

/// 必須変数の欠落を溜めながら値を読む
struct Settings<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
    missing: Vec<String>,
}

impl<'a> Settings<'a> {
    fn new(lookup: &'a dyn Fn(&str) -> Option<String>) -> Self {
        Self {
            lookup,
            missing: Vec::new(),
        }
    }

    /// 空白だけの値は未設定扱い
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&mut self, key: &str) -> String {
        match self.get(key) {
            Some(value) => value,
            None => {
                self.missing.push(key.to_string());
                String::new()
            }
        }
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn parse<T: FromStr>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            Some(value) => value.parse::<T>().map_err(|e| ConfigError::Invalid {
                key: key.to_string(),
                reason: e.to_string(),
                value,
            }),
            None => Ok(default),
        }
    }

    fn allow_list(&mut self, key: &str) -> Result<AllowList, ConfigError> {
        let raw = self.required(key);
        let ids = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<i64>().map_err(|e| ConfigError::Invalid {
                    key: key.to_string(),
                    value: raw.clone(),
                    reason: format!("{s:?} is not a user id: {e}"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        if ids.is_empty() && !raw.is_empty() {
            return Err(ConfigError::Invalid {
                key: key.to_string(),
                value: raw,
                reason: "no user ids listed".to_string(),
            });
        }
        Ok(AllowList::new(ids))
    }

    fn store(&mut self) -> StoreConfig {
        StoreConfig {
            url: self.required("SUPABASE_URL"),
            api_key: self.required("SUPABASE_KEY"),
            timeout: STORE_TIMEOUT,
        }
    }

    fn generation(&mut self) -> Result<GenerationConfig, ConfigError> {
        let api_key = self.required("GOOGLE_API_KEY");
        let timeout = Duration::from_secs(
            self.parse("GENERATION_TIMEOUT_SECS", DEFAULT_GENERATION_TIMEOUT_SECS)?,
        );
        Ok(GenerationConfig { api_key, timeout })
    }

    fn finish(self) -> Result<(), ConfigError> {
        if self.missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Missing(self.missing))
        }
    }
}
