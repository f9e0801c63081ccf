use std::sync::LazyLock;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

const DEFAULT_LEVEL: &str = "info";

/// Installs the stderr subscriber. `RUST_LOG` directives win over `level`,
/// which wins over the `info` default.
pub fn init(level: Option<&str>) {
	let rust_log = std::env::var("RUST_LOG").ok();

	let _ = tracing_subscriber::fmt()
		.with_env_filter(filter_for(rust_log.as_deref(), level))
		.with_writer(std::io::stderr)
		.with_target(false)
		.try_init();
}

/// `rust_log` is used verbatim as directives. `level` only scopes this crate.
fn filter_for(rust_log: Option<&str>, level: Option<&str>) -> EnvFilter {
	if let Some(directives) = rust_log.filter(|raw| !raw.trim().is_empty()) {
		if let Ok(filter) = EnvFilter::try_new(directives) {
			return filter;
		}
	}

	let target = env!("CARGO_PKG_NAME").replace('-', "_");
	let level = level.unwrap_or(DEFAULT_LEVEL);
	EnvFilter::try_new(format!("{target}={level}"))
		.unwrap_or_else(|_| EnvFilter::new(format!("{target}={DEFAULT_LEVEL}")))
}

pub static TEST_LOGGING: LazyLock<()> = LazyLock::new(|| {
	let _ = tracing_subscriber::fmt()
		.with_max_level(LevelFilter::TRACE)
		.with_test_writer()
		.try_init();
});
