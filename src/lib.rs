pub mod config;
pub mod error;
pub mod key_pool;
pub mod logging;

pub use error::{KeyPoolError, NoAvailableReason};
pub use key_pool::{KeyPoolManager, PoolConfig, PoolOptions, SaveFailurePolicy};
