use crate::error::{KeyPoolError, NoAvailableReason, Result};
use crate::key_pool::clock::{Clock, SystemClock};
use crate::key_pool::rate_window::RateWindow;
use crate::key_pool::resolver::{self, LimitValues};
use crate::key_pool::scheduler::{self, ResetReason};
use crate::key_pool::store;
use crate::key_pool::types::{
    KeyRecord, PoolConfig, PoolOptions, PoolState, SaveFailurePolicy, UsageStats,
};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Key 池管理器：按插入顺序选出第一个未触达限额的 key，记录用量，并按计划重置每日计数。
///
/// 非线程安全，所有操作都需要 `&mut self`。多个进程/线程共用同一个状态文件时需要外部串行化。
#[derive(Debug)]
pub struct KeyPoolManager<C: Clock = SystemClock> {
    file_path: PathBuf,
    config: PoolConfig,
    save_policy: SaveFailurePolicy,
    state: PoolState,
    windows: RateWindow,
    clock: C,
}

impl KeyPoolManager<SystemClock> {
    pub fn open(opts: PoolOptions) -> Result<Self> {
        Self::with_clock(opts, SystemClock)
    }
}

impl<C: Clock> KeyPoolManager<C> {
    pub fn with_clock(opts: PoolOptions, clock: C) -> Result<Self> {
        let now = clock.now_utc();
        let caller = LimitValues::from(&opts);

        let (state, config, fresh) = match store::load(&opts.file_path, now)? {
            Some(loaded) => {
                let config = resolver::resolve(&caller, loaded.config.as_ref())?;
                tracing::info!(
                    "已从 {} 加载 {} 个 key",
                    opts.file_path.display(),
                    loaded.state.keys.len()
                );
                (loaded.state, config, false)
            }
            None => {
                let config = resolver::resolve(&caller, None)?;
                tracing::info!("状态文件 {} 不存在，初始化新的 key 池", opts.file_path.display());
                (PoolState::new(now), config, true)
            }
        };

        let mut mgr = Self {
            file_path: opts.file_path,
            config,
            save_policy: opts.save_failure_policy,
            state,
            windows: RateWindow::new(),
            clock,
        };

        if fresh {
            mgr.persist()?;
        }
        let dirty = mgr.prepare();
        mgr.flush(dirty)?;
        Ok(mgr)
    }

    pub fn add_key(&mut self, key: &str) -> Result<()> {
        if key.trim().is_empty() {
            return Err(KeyPoolError::validation("key 不能为空"));
        }
        let dirty = self.prepare();
        if self.state.keys.contains_key(key) {
            return self.reject(dirty, KeyPoolError::DuplicateKey(key.to_string()));
        }

        self.state.keys.insert(key.to_string(), KeyRecord::default());
        tracing::info!("已添加 key: {key}");
        self.persist()
    }

    pub fn remove_key(&mut self, key: &str) -> Result<()> {
        let dirty = self.prepare();
        // shift_remove 保持其余 key 的优先级顺序
        if self.state.keys.shift_remove(key).is_none() {
            return self.reject(dirty, KeyPoolError::NotFound(key.to_string()));
        }
        self.windows.remove(key);
        tracing::info!("已移除 key: {key}");
        self.persist()
    }

    /// 返回按插入顺序第一个同时满足日限额和每分钟限额的 key。不会记录用量。
    pub fn select_key(&mut self) -> Result<String> {
        let dirty = self.prepare();
        if self.state.keys.is_empty() {
            return self.reject(
                dirty,
                KeyPoolError::NoAvailableKey(NoAvailableReason::NoKeysConfigured),
            );
        }

        let picked = self
            .state
            .keys
            .iter()
            .find(|(key, rec)| self.is_eligible(key, rec))
            .map(|(key, _)| key.clone());
        match picked {
            Some(key) => {
                self.flush(dirty)?;
                Ok(key)
            }
            None => self.reject(
                dirty,
                KeyPoolError::NoAvailableKey(NoAvailableReason::AllKeysExhausted),
            ),
        }
    }

    /// 记录一次使用。空 key 只记录 warn 并忽略；未知 key 返回 `UnknownKey`。
    pub fn record_usage(&mut self, key: &str) -> Result<()> {
        if key.trim().is_empty() {
            tracing::warn!("尝试为无效 key 记录用量: {key:?}");
            return Ok(());
        }
        let dirty = self.prepare();

        let Some(rec) = self.state.keys.get_mut(key) else {
            return self.reject(dirty, KeyPoolError::UnknownKey(key.to_string()));
        };
        rec.usage_today = rec.usage_today.saturating_add(1);

        if self.config.requests_per_minute.is_some() {
            self.windows.record(key, self.clock.now_instant());
        }
        self.persist()
    }

    pub fn usage_stats(&mut self) -> Result<UsageStats> {
        let dirty = self.prepare();
        self.flush(dirty)?;
        Ok(self.state.keys.clone())
    }

    /// 选出一个 key 交给 `f` 使用；无论 `f` 正常返回还是 panic，都会且只会记录一次用量。
    ///
    /// 记录用量本身的错误只写日志，不会覆盖 `f` 的结果。
    pub fn with_key<T>(&mut self, f: impl FnOnce(&str) -> T) -> Result<T> {
        let key = self.select_key()?;
        let guard = UsageGuard { manager: self, key };
        let out = f(guard.key.as_str());
        drop(guard);
        Ok(out)
    }

    /// 检查是否到了重置时间，到了就清零所有 key 的当日用量并保存。
    pub fn reconcile(&mut self) -> Result<Option<ResetReason>> {
        let reason = self.reset_if_due();
        self.flush(reason.is_some())?;
        Ok(reason)
    }

    /// 只修改内存状态，由调用方决定何时保存。
    fn reset_if_due(&mut self) -> Option<ResetReason> {
        let now = self.clock.now_utc();
        let last = self.state.last_reset_time;
        let reason = scheduler::reset_due(&self.config, last, now)?;

        tracing::info!(
            "重置每日用量，原因: {reason}，上次重置: {}",
            store::format_timestamp(last)
        );
        let mut updated = 0usize;
        for rec in self.state.keys.values_mut() {
            if rec.usage_today != 0 {
                rec.usage_today = 0;
                updated += 1;
            }
        }
        self.state.last_reset_time = now;

        if updated > 0 {
            tracing::info!("已重置 {updated} 个 key 的当日用量");
        } else {
            tracing::info!("没有需要重置用量的 key");
        }
        Some(reason)
    }

    pub fn keys(&self) -> Vec<String> {
        self.state.keys.keys().cloned().collect()
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn last_reset_time(&self) -> DateTime<Utc> {
        self.state.last_reset_time
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// 重置检查 + 清理过期窗口。返回内存状态是否因重置而需要保存。
    ///
    /// 保存推迟到操作本身生效之后，保存失败也不会让操作半途而废。
    fn prepare(&mut self) -> bool {
        let reset = self.reset_if_due().is_some();
        if self.config.requests_per_minute.is_some() {
            self.windows.evict_stale(self.clock.now_instant());
        }
        reset
    }

    fn flush(&self, dirty: bool) -> Result<()> {
        if dirty { self.persist() } else { Ok(()) }
    }

    /// 操作被拒绝时仍要保存已发生的重置；此时返回操作本身的错误，保存失败只记日志。
    fn reject<T>(&self, dirty: bool, err: KeyPoolError) -> Result<T> {
        if let Err(e) = self.flush(dirty) {
            tracing::error!("{e}");
        }
        Err(err)
    }

    fn is_eligible(&self, key: &str, rec: &KeyRecord) -> bool {
        let under_daily = self
            .config
            .daily_limit
            .is_none_or(|limit| rec.usage_today < limit);
        let under_rpm = self
            .config
            .requests_per_minute
            .is_none_or(|limit| (self.windows.count(key) as u64) < limit);
        under_daily && under_rpm
    }

    fn persist(&self) -> Result<()> {
        match store::save(&self.file_path, &self.state, &self.config) {
            Ok(()) => Ok(()),
            Err(e) => match self.save_policy {
                SaveFailurePolicy::LogAndContinue => {
                    tracing::error!("保存状态文件失败: {e:#}");
                    Ok(())
                }
                SaveFailurePolicy::Propagate => Err(KeyPoolError::Persist(e)),
            },
        }
    }
}

struct UsageGuard<'a, C: Clock> {
    manager: &'a mut KeyPoolManager<C>,
    key: String,
}

impl<C: Clock> Drop for UsageGuard<'_, C> {
    fn drop(&mut self) {
        if let Err(e) = self.manager.record_usage(&self.key) {
            tracing::error!("with_key 结束时记录 key {} 的用量失败: {e}", self.key);
        }
    }
}
