use console::Style;
use log::{Level, LevelFilter, Metadata, Record};
use sensorium::env_utils::EnvVar;

struct CliLogger;
static CLI_LOGGER: CliLogger = CliLogger;

impl log::Log for CliLogger {
    fn enabled(
        &self,
        metadata: &Metadata<'_>,
    ) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(
        &self,
        record: &Record<'_>,
    ) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let style = match record.level() {
            Level::Error => Style::new().red().bold(),
            Level::Warn => Style::new().yellow().bold(),
            Level::Info => Style::new().green(),
            Level::Debug => Style::new().cyan(),
            Level::Trace => Style::new().dim(),
        };
        let tag = format!("{:<5}", record.level().as_str().to_lowercase());
        eprintln!("{} {}", style.apply_to(tag), record.args());
    }

    fn flush(&self) {}
}

/// `-v` raises the level to debug, `-vv` to trace. Without flags the level
/// comes from `SENSORIUM_LOG`, falling back to info.
pub fn level_filter(
    verbose: u8,
    env_value: &str,
) -> LevelFilter {
    match verbose {
        0 => env_value.trim().parse().unwrap_or(LevelFilter::Info),
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

pub fn init(verbose: u8) {
    let level = level_filter(verbose, &EnvVar::LogLevel.value());
    let _ = log::set_logger(&CLI_LOGGER).map(|_| log::set_max_level(level));
}
