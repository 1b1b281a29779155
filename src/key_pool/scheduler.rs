//! 每日用量重置的判定逻辑。纯函数，时间由调用方传入。

use crate::key_pool::types::PoolConfig;
use chrono::{DateTime, Duration, Utc};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    /// 距上次重置已满 `days` 天。
    IntervalElapsed { days: u32 },
    /// 已过每日的 UTC 重置时刻。
    DailyHourReached { hour: u32 },
}

impl fmt::Display for ResetReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IntervalElapsed { days } => write!(f, "interval elapsed ({days} days)"),
            Self::DailyHourReached { hour } => write!(f, "daily hour reached ({hour:02}:00 UTC)"),
        }
    }
}

/// 判断当前是否需要重置。间隔条件优先，满足其一即返回，不会同时应用两条。
pub fn reset_due(
    config: &PoolConfig,
    last_reset: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Option<ResetReason> {
    if let Some(days) = config.reset_interval_days
        && let Some(due) = last_reset.checked_add_signed(Duration::days(i64::from(days)))
        && now >= due
    {
        return Some(ResetReason::IntervalElapsed { days });
    }

    if let Some(hour) = config.reset_hour_utc
        && let Some(next) = next_daily_reset(last_reset, hour)
        && now >= next
    {
        return Some(ResetReason::DailyHourReached { hour });
    }

    None
}

/// `last_reset` 之后第一次出现的 `hour:00 UTC`（严格晚于 `last_reset`）。
pub fn next_daily_reset(last_reset: DateTime<Utc>, hour: u32) -> Option<DateTime<Utc>> {
    let candidate = last_reset.date_naive().and_hms_opt(hour, 0, 0)?.and_utc();
    if candidate <= last_reset {
        candidate.checked_add_signed(Duration::days(1))
    } else {
        Some(candidate)
    }
}
