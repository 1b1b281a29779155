/// 日志等级：
/// - off：完全关闭日志
/// - low：本项目 info 级别（默认）
/// - medium：本项目 debug 级别
/// - high：本项目 trace 级别，依赖库 info 级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Off = 0,
    Low = 1,
    Medium = 2,
    High = 3,
}

impl LogLevel {
    pub fn parse(debug: &str) -> Self {
        match debug.trim().to_lowercase().as_str() {
            "off" | "none" => Self::Off,
            "medium" => Self::Medium,
            "high" | "all" => Self::High,
            _ => Self::Low,
        }
    }

    fn crate_directive(self) -> &'static str {
        match self {
            Self::Off => "keypool=off",
            Self::Low => "keypool=info",
            Self::Medium => "keypool=debug",
            Self::High => "keypool=trace",
        }
    }
}

/// 生成 EnvFilter 指令。依赖库默认压到 warn，用户的 RUST_LOG 优先；
/// 但只要 RUST_LOG 没有单独提到本项目，本项目日志至少保留到 `level` 对应的级别。
pub fn filter_directives(level: LogLevel, rust_log: &str) -> String {
    if level == LogLevel::Off {
        return "off".to_string();
    }

    let env = rust_log.trim();
    let base = if level == LogLevel::High { "info" } else { "warn" };
    if env.is_empty() {
        format!("{base},{}", level.crate_directive())
    } else if env.contains("keypool") {
        env.to_string()
    } else {
        format!("{env},{}", level.crate_directive())
    }
}
