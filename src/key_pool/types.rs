use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_STATE_FILE: &str = "api_keys.json";

/// 单个 key 的用量记录。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    /// 自上次重置以来记录的使用次数。
    pub usage_today: u64,
}

/// 合并、校验之后实际生效的配置。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    pub daily_limit: Option<u64>,
    pub requests_per_minute: Option<u64>,
    pub reset_hour_utc: Option<u32>,
    pub reset_interval_days: Option<u32>,
}

/// 按插入顺序（即选择优先级）排列的用量快照。
pub type UsageStats = IndexMap<String, KeyRecord>;

/// 保存失败时的处理方式。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SaveFailurePolicy {
    /// 记录错误日志后继续，内存状态仍然有效。
    #[default]
    LogAndContinue,
    /// 把错误返回给触发保存的调用方（内存中的修改不会回滚）。
    Propagate,
}

impl SaveFailurePolicy {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "propagate" | "strict" | "error" => Self::Propagate,
            _ => Self::LogAndContinue,
        }
    }
}

/// 构造 `KeyPoolManager` 时的参数，所有字段都可以单独省略。
#[derive(Debug, Clone)]
pub struct PoolOptions {
    pub file_path: PathBuf,
    pub daily_limit: Option<u64>,
    pub requests_per_minute: Option<u64>,
    pub reset_hour_utc: Option<u32>,
    pub reset_interval_days: Option<u32>,
    pub save_failure_policy: SaveFailurePolicy,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            file_path: PathBuf::from(DEFAULT_STATE_FILE),
            daily_limit: None,
            requests_per_minute: None,
            reset_hour_utc: None,
            reset_interval_days: None,
            save_failure_policy: SaveFailurePolicy::default(),
        }
    }
}

impl PoolOptions {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            ..Self::default()
        }
    }

    pub fn daily_limit(mut self, v: u64) -> Self {
        self.daily_limit = Some(v);
        self
    }

    pub fn requests_per_minute(mut self, v: u64) -> Self {
        self.requests_per_minute = Some(v);
        self
    }

    pub fn reset_hour_utc(mut self, v: u32) -> Self {
        self.reset_hour_utc = Some(v);
        self
    }

    pub fn reset_interval_days(mut self, v: u32) -> Self {
        self.reset_interval_days = Some(v);
        self
    }

    pub fn save_failure_policy(mut self, policy: SaveFailurePolicy) -> Self {
        self.save_failure_policy = policy;
        self
    }
}

/// 持久化的聚合状态（config 单独由 manager 持有）。
#[derive(Debug, Clone)]
pub struct PoolState {
    pub keys: IndexMap<String, KeyRecord>,
    pub last_reset_time: DateTime<Utc>,
}

impl PoolState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            keys: IndexMap::new(),
            last_reset_time: now,
        }
    }
}
