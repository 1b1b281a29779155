use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// 时间来源：墙上时间用于重置判定，单调时钟用于每分钟窗口。
pub trait Clock {
    fn now_utc(&self) -> DateTime<Utc>;
    fn now_instant(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn now_instant(&self) -> Instant {
        Instant::now()
    }
}

/// 手动推进的时钟，用于测试和离线模拟。克隆后共享同一份时间。
#[derive(Debug, Clone)]
pub struct ManualClock {
    inner: Arc<Mutex<ManualTime>>,
}

#[derive(Debug)]
struct ManualTime {
    wall: DateTime<Utc>,
    base: Instant,
    elapsed: Duration,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ManualTime {
                wall: start,
                base: Instant::now(),
                elapsed: Duration::ZERO,
            })),
        }
    }

    /// 同时推进墙上时间和单调时钟。
    pub fn advance(&self, d: Duration) {
        let mut t = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        t.elapsed += d;
        if let Ok(delta) = chrono::Duration::from_std(d) {
            t.wall += delta;
        }
    }

    /// 只改墙上时间（模拟系统时间调整），单调时钟不动。
    pub fn set_utc(&self, wall: DateTime<Utc>) {
        let mut t = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        t.wall = wall;
    }
}

impl Clock for ManualClock {
    fn now_utc(&self) -> DateTime<Utc> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).wall
    }

    fn now_instant(&self) -> Instant {
        let t = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        t.base + t.elapsed
    }
}
