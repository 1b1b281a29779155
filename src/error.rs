use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// `select_key` 失败的两种情况，调用方可据此分支处理。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoAvailableReason {
    /// 池中没有任何 key。
    NoKeysConfigured,
    /// 所有 key 都已触达日限额或每分钟限额。
    AllKeysExhausted,
}

impl fmt::Display for NoAvailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoKeysConfigured => f.write_str("no keys configured"),
            Self::AllKeysExhausted => f.write_str("all keys exhausted"),
        }
    }
}

#[derive(Debug, Error)]
pub enum KeyPoolError {
    #[error("参数错误: {0}")]
    Validation(String),

    #[error("key 已存在: {0}")]
    DuplicateKey(String),

    #[error("key 不存在: {0}")]
    NotFound(String),

    #[error("记录用量失败，未知 key: {0}")]
    UnknownKey(String),

    #[error("没有可用的 key: {0}")]
    NoAvailableKey(NoAvailableReason),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("状态文件损坏 {}: {message}", .path.display())]
    CorruptState { path: PathBuf, message: String },

    #[error("保存状态文件失败: {0:#}")]
    Persist(anyhow::Error),
}

impl KeyPoolError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn corrupt_state(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::CorruptState {
            path: path.into(),
            message: message.into(),
        }
    }

    /// 只有 `CorruptState` 会中止构造，其余错误调用方都可以恢复。
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::CorruptState { .. })
    }

    pub fn no_available_reason(&self) -> Option<NoAvailableReason> {
        match self {
            Self::NoAvailableKey(reason) => Some(*reason),
            _ => None,
        }
    }
}

pub type Result<T, E = KeyPoolError> = std::result::Result<T, E>;
