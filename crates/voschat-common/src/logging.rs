use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "voschat=info,voschat_sync=info,warn";

const VERBOSE_FILTER: &str = "voschat=debug,voschat_sync=debug,info";

/// Install the global subscriber: `RUST_LOG` if set, otherwise the default
/// filter (or the debug one when `verbose`).
pub fn init_tracing(verbose: bool) -> anyhow::Result<()> {
    let fallback = if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init()?;
    Ok(())
}
