//! 配置合并：构造参数优先，其次是状态文件里保存的配置。

use crate::error::{KeyPoolError, Result};
use crate::key_pool::types::{PoolConfig, PoolOptions};
use serde::Deserialize;

/// 未经校验的四项配置。状态文件里可能写着负数，所以统一按 i64 读取。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LimitValues {
    pub daily_limit: Option<i64>,
    pub requests_per_minute: Option<i64>,
    pub reset_hour_utc: Option<i64>,
    pub reset_interval_days: Option<i64>,
}

impl From<&PoolOptions> for LimitValues {
    fn from(opts: &PoolOptions) -> Self {
        Self {
            daily_limit: opts.daily_limit.map(saturating_i64),
            requests_per_minute: opts.requests_per_minute.map(saturating_i64),
            reset_hour_utc: opts.reset_hour_utc.map(i64::from),
            reset_interval_days: opts.reset_interval_days.map(i64::from),
        }
    }
}

fn saturating_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

/// 逐字段合并后校验，得到最终生效的配置。
pub fn resolve(caller: &LimitValues, stored: Option<&LimitValues>) -> Result<PoolConfig> {
    let stored = stored.copied().unwrap_or_default();

    let merged = LimitValues {
        daily_limit: pick("daily_limit", caller.daily_limit, stored.daily_limit),
        requests_per_minute: pick(
            "requests_per_minute",
            caller.requests_per_minute,
            stored.requests_per_minute,
        ),
        reset_hour_utc: pick("reset_hour_utc", caller.reset_hour_utc, stored.reset_hour_utc),
        reset_interval_days: pick(
            "reset_interval_days",
            caller.reset_interval_days,
            stored.reset_interval_days,
        ),
    };

    validate(&merged)
}

fn pick(name: &str, caller: Option<i64>, stored: Option<i64>) -> Option<i64> {
    match (caller, stored) {
        (Some(c), Some(s)) => {
            if c != s {
                tracing::warn!("构造参数 {name}={c} 覆盖了状态文件中保存的值 {s}");
            }
            Some(c)
        }
        (Some(c), None) => Some(c),
        (None, Some(s)) => {
            tracing::info!("从状态文件加载 {name}={s}");
            Some(s)
        }
        (None, None) => None,
    }
}

fn validate(v: &LimitValues) -> Result<PoolConfig> {
    let reset_hour_utc = match v.reset_hour_utc {
        None => None,
        Some(h) if (0..=23).contains(&h) => u32::try_from(h).ok(),
        Some(h) => {
            return Err(KeyPoolError::config(format!(
                "reset_hour_utc 必须在 0 到 23 之间，当前为 {h}"
            )));
        }
    };

    let reset_interval_days = match v.reset_interval_days {
        None => None,
        Some(d) if d > 0 => Some(u32::try_from(d).map_err(|_| {
            KeyPoolError::config(format!("reset_interval_days 过大: {d}"))
        })?),
        Some(d) => {
            return Err(KeyPoolError::config(format!(
                "reset_interval_days 必须是正整数，当前为 {d}"
            )));
        }
    };

    Ok(PoolConfig {
        daily_limit: positive_limit("daily_limit", v.daily_limit)?,
        requests_per_minute: positive_limit("requests_per_minute", v.requests_per_minute)?,
        reset_hour_utc,
        reset_interval_days,
    })
}

fn positive_limit(name: &str, v: Option<i64>) -> Result<Option<u64>> {
    match v {
        None => Ok(None),
        Some(n) if n > 0 => Ok(u64::try_from(n).ok()),
        Some(n) => Err(KeyPoolError::config(format!(
            "{name} 必须是正整数，当前为 {n}"
        ))),
    }
}
