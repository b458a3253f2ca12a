use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable holding the log filter directives.
pub const LOG_ENV_VAR: &str = "VORBIS_SOURCE_LOG";

/// Initialize structured JSON logging.
///
/// Defaults to `error` level unless overridden by `VORBIS_SOURCE_LOG`
/// (e.g. `VORBIS_SOURCE_LOG=vorbis_source=debug`).
pub fn init() {
    init_with_verbosity(0);
}

/// Initialize structured JSON logging with this crate's events raised by `verbose` steps.
///
/// `0` logs errors only, `1` adds the warnings a session emits for faults it absorbs
/// (corrupt packets, byte source errors, clamped seeks), `2` adds open/seek details and `3`
/// adds per-packet tracing. Directives in `VORBIS_SOURCE_LOG` still win.
pub fn init_with_verbosity(verbose: u8) {
    let env = std::env::var(LOG_ENV_VAR).ok();
    let filter = build_filter(env.as_deref(), crate_level(verbose));

    // Logs go to stderr so decoded output on stdout stays clean.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_current_span(true)
                .with_span_list(true),
        )
        .try_init();
}

fn crate_level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::ERROR,
        1 => LevelFilter::WARN,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Errors from everything, plus this crate's events at `level`, unless `env` says otherwise.
fn build_filter(env: Option<&str>, level: LevelFilter) -> EnvFilter {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::ERROR.into())
        .parse_lossy(env.unwrap_or_default());

    if env.is_some_and(|s| !s.trim().is_empty()) || level == LevelFilter::ERROR {
        return filter;
    }

    match format!("{}={level}", env!("CARGO_CRATE_NAME")).parse::<Directive>() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    }
}
