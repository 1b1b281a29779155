//! Key 池（Key Pool）模块。
//!
//! 管理一组可互换的凭证 key：每个 key 受每日限额和每分钟限额约束，
//! 每日用量按固定 UTC 时刻和/或天数间隔自动重置，状态持久化到 JSON 文件。

pub mod clock;
mod manager;
pub mod rate_window;
pub mod resolver;
pub mod scheduler;
pub mod store;
mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use manager::KeyPoolManager;
pub use scheduler::ResetReason;
pub use types::{
    DEFAULT_STATE_FILE, KeyRecord, PoolConfig, PoolOptions, PoolState, SaveFailurePolicy,
    UsageStats,
};
