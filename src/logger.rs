//! 标准错误输出日志
//!
//! 库内部只使用`log`门面，可执行程序启动时调用[`init`]安装本实现。

use std::io::Write;
use std::str::FromStr;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};

/// 日志级别环境变量
pub const LOG_LEVEL_ENV: &str = "BME280_LOG";

/// 输出到stderr的日志实现，每行带上自启动以来的毫秒数
pub struct StderrLogger {
    level: LevelFilter,
    start: Instant,
}

impl StderrLogger {
    pub fn new(level: LevelFilter) -> Self {
        Self {
            level,
            start: Instant::now(),
        }
    }
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let elapsed = self.start.elapsed();
        let mut stderr = std::io::stderr().lock();
        // 写日志失败时没有更好的去处，直接忽略
        let _ = writeln!(
            stderr,
            "[{:>6}.{:03}] {:<5} {}: {}",
            elapsed.as_secs(),
            elapsed.subsec_millis(),
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// 解析日志级别，无法识别时使用`Info`
pub fn parse_level(value: Option<&str>) -> LevelFilter {
    value
        .and_then(|value| LevelFilter::from_str(value.trim()).ok())
        .unwrap_or(LevelFilter::Info)
}

/// 安装全局日志，级别取自[`LOG_LEVEL_ENV`]
pub fn init() -> anyhow::Result<()> {
    let level = parse_level(std::env::var(LOG_LEVEL_ENV).ok().as_deref());

    log::set_boxed_logger(Box::new(StderrLogger::new(level)))
        .map_err(|err| anyhow::anyhow!("日志初始化失败: {}", err))?;
    log::set_max_level(level);

    // OK
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_parsing_falls_back_to_info() {
        assert_eq!(parse_level(Some("debug")), LevelFilter::Debug);
        assert_eq!(parse_level(Some(" WARN ")), LevelFilter::Warn);
        assert_eq!(parse_level(Some("loud")), LevelFilter::Info);
        assert_eq!(parse_level(None), LevelFilter::Info);
    }

    #[test]
    fn logger_respects_level() {
        let logger = StderrLogger::new(LevelFilter::Warn);
        let warn = Metadata::builder().level(log::Level::Warn).build();
        let debug = Metadata::builder().level(log::Level::Debug).build();
        assert!(logger.enabled(&warn));
        assert!(!logger.enabled(&debug));
    }
}
