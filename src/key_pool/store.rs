//! 状态文件的读取（含修复）与原子写入。

use crate::error::{KeyPoolError, Result};
use crate::key_pool::resolver::LimitValues;
use crate::key_pool::types::{KeyRecord, PoolConfig, PoolState};
use anyhow::Context;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sonic_rs::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};

/// 从文件恢复出的状态。`config` 为 None 表示文件里没有保存配置。
#[derive(Debug)]
pub struct LoadedState {
    pub state: PoolState,
    pub config: Option<LimitValues>,
}

#[derive(Debug, Deserialize)]
struct RawState {
    keys: Option<IndexMap<String, RawKeyRecord>>,
    config: Option<LimitValues>,
    last_reset_time: Option<sonic_rs::Value>,
}

#[derive(Debug, Deserialize)]
struct RawKeyRecord {
    usage_today: Option<u64>,
}

#[derive(Debug, Serialize)]
struct StateFile<'a> {
    keys: &'a IndexMap<String, KeyRecord>,
    config: &'a PoolConfig,
    last_reset_time: String,
}

/// 读取状态文件。文件不存在时返回 `Ok(None)`；缺失或无法解析的字段按默认值修复并记录 warn。
pub fn load(path: &Path, now: DateTime<Utc>) -> Result<Option<LoadedState>> {
    let data = match std::fs::read(path) {
        Ok(v) => v,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(KeyPoolError::corrupt_state(path, format!("读取失败: {e}")));
        }
    };

    let root: sonic_rs::Value = sonic_rs::from_slice(&data)
        .map_err(|e| KeyPoolError::corrupt_state(path, format!("JSON 解析失败: {e}")))?;
    if !root.is_object() {
        return Err(KeyPoolError::corrupt_state(path, "根节点必须是 JSON 对象"));
    }

    let raw: RawState = sonic_rs::from_value(&root)
        .map_err(|e| KeyPoolError::corrupt_state(path, format!("字段格式错误: {e}")))?;

    let keys = match raw.keys {
        Some(keys) => keys
            .into_iter()
            .map(|(key, rec)| {
                let usage_today = rec.usage_today.unwrap_or_else(|| {
                    tracing::warn!("key {key} 缺少 usage_today，按 0 处理");
                    0
                });
                (key, KeyRecord { usage_today })
            })
            .collect(),
        None => {
            tracing::warn!("{} 缺少 keys 字段，按空列表处理", path.display());
            IndexMap::new()
        }
    };

    let last_reset_time = match raw.last_reset_time.as_ref() {
        None => {
            tracing::warn!("{} 缺少 last_reset_time，使用当前时间", path.display());
            now
        }
        Some(v) => match v.as_str().and_then(parse_timestamp) {
            Some(ts) => ts,
            None => {
                tracing::warn!(
                    "{} 中的 last_reset_time 无法解析（{v:?}），使用当前时间",
                    path.display()
                );
                now
            }
        },
    };

    if raw.config.is_none() {
        tracing::warn!("{} 缺少 config，仅使用构造参数", path.display());
    }

    Ok(Some(LoadedState {
        state: PoolState {
            keys,
            last_reset_time,
        },
        config: raw.config,
    }))
}

/// 先写 `<path>.tmp` 再 rename 覆盖，避免中途崩溃留下半个文件。
pub fn save(path: &Path, state: &PoolState, config: &PoolConfig) -> anyhow::Result<()> {
    ensure_parent_dir(path)?;

    let file = StateFile {
        keys: &state.keys,
        config,
        last_reset_time: format_timestamp(state.last_reset_time),
    };
    let data = sonic_rs::to_vec_pretty(&file).context("序列化状态文件失败")?;

    let tmp = temp_path(path);
    let written = write_synced(&tmp, &data)
        .and_then(|()| std::fs::rename(&tmp, path).context("替换状态文件失败"));
    if written.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    written.with_context(|| format!("保存 {} 失败", path.display()))
}

fn write_synced(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    let mut f = std::fs::File::create(path).context("创建临时文件失败")?;
    f.write_all(data).context("写入临时文件失败")?;
    f.sync_all().context("刷盘失败")
}

pub fn temp_path(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(".tmp");
    PathBuf::from(s)
}

fn ensure_parent_dir(path: &Path) -> anyhow::Result<()> {
    let Some(dir) = path.parent() else {
        return Ok(());
    };
    if dir.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(dir).context("创建数据目录失败")
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// 接受 RFC 3339；不带时区的 ISO-8601 时间按 UTC 解释。
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}
