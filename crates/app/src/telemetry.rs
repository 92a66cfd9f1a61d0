//! Tracing setup.
//!
//! - `LOG_LEVEL` overrides the filter (e.g. `debug` or
//!   `info,lesson_core=debug,services=debug`); otherwise the configured level
//!   is used.
//! - `LOG_FORMAT=json` switches to structured JSON lines.
//!
//! Logs go to stderr so they never interleave with the lesson on stdout.

use tracing_subscriber::EnvFilter;

pub fn init_tracing(configured_level: Option<&str>) {
    let filter = EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| {
        EnvFilter::try_new(configured_level.unwrap_or("warn"))
            .unwrap_or_else(|_| EnvFilter::new("warn"))
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => {
            builder.json().init();
        }
        _ => {
            builder.init();
        }
    }
}
