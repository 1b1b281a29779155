use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// 每分钟限额的统计窗口。
pub const WINDOW: Duration = Duration::from_secs(60);

/// 每个 key 最近 60 秒内的使用时刻（单调时钟）。只存在于内存中。
#[derive(Debug, Default)]
pub struct RateWindow {
    entries: HashMap<String, VecDeque<Instant>>,
}

impl RateWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, key: &str, now: Instant) {
        self.entries.entry(key.to_string()).or_default().push_back(now);
    }

    /// 丢弃已满 60 秒的时刻；窗口清空的 key 整个移除。
    pub fn evict_stale(&mut self, now: Instant) {
        self.entries.retain(|_, stamps| {
            // 时刻按写入顺序单调递增，从队头弹出即可
            while let Some(front) = stamps.front() {
                if now.saturating_duration_since(*front) >= WINDOW {
                    stamps.pop_front();
                } else {
                    break;
                }
            }
            !stamps.is_empty()
        });
    }

    pub fn count(&self, key: &str) -> usize {
        self.entries.get(key).map_or(0, VecDeque::len)
    }

    pub fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_only_recent_usage() {
        let t0 = Instant::now();
        let mut w = RateWindow::new();
        w.record("a", t0);
        w.record("a", t0 + Duration::from_secs(30));
        w.record("b", t0 + Duration::from_secs(10));

        w.evict_stale(t0 + Duration::from_secs(59));
        assert_eq!(w.count("a"), 2);
        assert_eq!(w.count("b"), 1);

        w.evict_stale(t0 + Duration::from_secs(60));
        assert_eq!(w.count("a"), 1);
        assert_eq!(w.count("b"), 1);

        w.evict_stale(t0 + Duration::from_secs(90));
        assert_eq!(w.count("a"), 0);
        assert_eq!(w.count("b"), 0);
        assert_eq!(w.tracked_keys(), 0);
    }

    #[test]
    fn untracked_and_removed_keys_count_zero() {
        let t0 = Instant::now();
        let mut w = RateWindow::new();
        assert_eq!(w.count("missing"), 0);

        w.record("a", t0);
        w.remove("a");
        assert_eq!(w.count("a"), 0);
        assert_eq!(w.tracked_keys(), 0);
    }
}
