use crate::key_pool::{DEFAULT_STATE_FILE, PoolOptions, SaveFailurePolicy};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde::Deserialize;
use std::path::PathBuf;

const CONFIG_FILE: &str = "keypool.toml";

/// 命令行程序的运行配置：`keypool.toml` 打底，环境变量覆盖。
#[derive(Debug, Clone)]
pub struct Config {
    pub file_path: PathBuf,
    pub daily_limit: Option<u64>,
    pub requests_per_minute: Option<u64>,
    pub reset_hour_utc: Option<u32>,
    pub reset_interval_days: Option<u32>,
    pub save_failure_policy: SaveFailurePolicy,
    pub debug: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawEnv {
    #[serde(alias = "KEY_POOL_FILE")]
    key_pool_file: Option<String>,
    #[serde(alias = "DAILY_LIMIT")]
    daily_limit: Option<u64>,
    #[serde(alias = "REQUESTS_PER_MINUTE")]
    requests_per_minute: Option<u64>,
    #[serde(alias = "RESET_HOUR_UTC")]
    reset_hour_utc: Option<u32>,
    #[serde(alias = "RESET_INTERVAL_DAYS")]
    reset_interval_days: Option<u32>,
    #[serde(alias = "SAVE_FAILURE_POLICY")]
    save_failure_policy: Option<String>,
    #[serde(alias = "DEBUG")]
    debug: Option<String>,
}

impl Config {
    pub fn load() -> Self {
        let figment = Figment::from(Toml::file(CONFIG_FILE)).merge(Env::raw());
        let mut cfg = Self::from_figment(&figment);

        // 命令行覆盖：-debug <level>
        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            if arg == "-debug"
                && let Some(v) = args.next()
            {
                cfg.debug = v;
            }
        }

        cfg
    }

    fn from_figment(figment: &Figment) -> Self {
        let raw = figment.extract::<RawEnv>().unwrap_or_else(|e| {
            eprintln!("读取配置失败，使用默认值: {e}");
            RawEnv::default()
        });

        Self {
            file_path: PathBuf::from(
                raw.key_pool_file
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_STATE_FILE.to_string()),
            ),
            daily_limit: raw.daily_limit,
            requests_per_minute: raw.requests_per_minute,
            reset_hour_utc: raw.reset_hour_utc,
            reset_interval_days: raw.reset_interval_days,
            save_failure_policy: raw
                .save_failure_policy
                .as_deref()
                .map(SaveFailurePolicy::parse)
                .unwrap_or_default(),
            debug: raw.debug.unwrap_or_else(|| "low".to_string()),
        }
    }

    pub fn log_level(&self) -> crate::logging::LogLevel {
        crate::logging::LogLevel::parse(&self.debug)
    }

    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            file_path: self.file_path.clone(),
            daily_limit: self.daily_limit,
            requests_per_minute: self.requests_per_minute,
            reset_hour_utc: self.reset_hour_utc,
            reset_interval_days: self.reset_interval_days,
            save_failure_policy: self.save_failure_policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::providers::Serialized;

    #[test]
    fn toml_values_are_overridden_by_later_providers() {
        let toml = r#"
            key_pool_file = "data/keys.json"
            daily_limit = 50
            reset_hour_utc = 3
        "#;
        let figment = Figment::from(Toml::string(toml)).merge(Serialized::default("daily_limit", 10));

        let cfg = Config::from_figment(&figment);
        assert_eq!(cfg.file_path, PathBuf::from("data/keys.json"));
        assert_eq!(cfg.daily_limit, Some(10));
        assert_eq!(cfg.reset_hour_utc, Some(3));
        assert_eq!(cfg.requests_per_minute, None);
        assert_eq!(cfg.save_failure_policy, SaveFailurePolicy::LogAndContinue);
    }

    #[test]
    fn broken_sources_fall_back_to_defaults() {
        let figment = Figment::from(Toml::string("daily_limit = \"lots\""));
        let cfg = Config::from_figment(&figment);
        assert_eq!(cfg.file_path, PathBuf::from(DEFAULT_STATE_FILE));
        assert_eq!(cfg.daily_limit, None);
    }

    #[test]
    fn pool_options_carry_every_field() {
        let figment = Figment::from(Toml::string(
            "requests_per_minute = 5\nreset_interval_days = 2\nsave_failure_policy = \"propagate\"",
        ));
        let opts = Config::from_figment(&figment).pool_options();
        assert_eq!(opts.requests_per_minute, Some(5));
        assert_eq!(opts.reset_interval_days, Some(2));
        assert_eq!(opts.save_failure_policy, SaveFailurePolicy::Propagate);
    }
}
