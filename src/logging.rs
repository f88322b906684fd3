//! Log subscriber setup for embedding applications

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

/// Install a compact stderr subscriber scoped to this crate's targets.
///
/// Call once at startup. Applications that already run their own
/// subscriber should skip this and add `trendwatch` to their filter
/// targets instead.
pub fn init_logging(level: LevelFilter) {
    let filter = filter::Targets::new().with_target("trendwatch", level);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}
