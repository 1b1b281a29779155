use anyhow::{Context, bail};
use keypool::config::Config;
use keypool::key_pool::store::format_timestamp;
use keypool::{KeyPoolManager, logging};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "用法: keypool [-debug <level>] <add <key> | remove <key> | select | record <key> | use | stats | config>";

fn main() -> anyhow::Result<()> {
    let cfg = Config::load();

    init_tracing(&cfg);

    let args = command_args();
    let Some(command) = args.first() else {
        bail!("{USAGE}");
    };

    let mut pool = match KeyPoolManager::open(cfg.pool_options()) {
        Ok(pool) => pool,
        Err(e) => {
            if !e.is_recoverable() {
                tracing::error!("状态文件无法使用，请修复或移走 {} 后重试", cfg.file_path.display());
            }
            return Err(e)
                .with_context(|| format!("打开 key 池 {} 失败", cfg.file_path.display()));
        }
    };

    match (command.as_str(), args.get(1)) {
        ("add", Some(key)) => {
            pool.add_key(key).context("添加 key 失败")?;
            println!("added {key}");
        }
        ("remove", Some(key)) => {
            pool.remove_key(key).context("移除 key 失败")?;
            println!("removed {key}");
        }
        ("select", None) => {
            let key = pool.select_key().context("选择 key 失败")?;
            println!("{key}");
        }
        ("record", Some(key)) => {
            pool.record_usage(key).context("记录用量失败")?;
            let usage = pool
                .usage_stats()?
                .get(key.as_str())
                .map_or(0, |r| r.usage_today);
            println!("{key} usage_today={usage}");
        }
        ("use", None) => {
            let key = pool
                .with_key(|k| k.to_string())
                .context("获取 key 失败")?;
            println!("{key}");
        }
        ("stats", None) => {
            let stats = pool.usage_stats()?;
            let out = sonic_rs::to_string_pretty(&stats).context("序列化用量失败")?;
            println!("{out}");
        }
        ("config", None) => {
            let out = sonic_rs::to_string_pretty(pool.config()).context("序列化配置失败")?;
            println!("{out}");
            println!("last_reset_time: {}", format_timestamp(pool.last_reset_time()));
        }
        _ => bail!("{USAGE}"),
    }

    Ok(())
}

/// 去掉 `-debug <level>` 之后剩下的位置参数。
fn command_args() -> Vec<String> {
    let mut out = Vec::new();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "-debug" {
            let _ = args.next();
            continue;
        }
        out.push(arg);
    }
    out
}

fn init_tracing(cfg: &Config) {
    let env = std::env::var("RUST_LOG").unwrap_or_default();
    let filter = EnvFilter::new(logging::filter_directives(cfg.log_level(), &env));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .try_init();
}
