//! `tracing` subscriber setup.

use tracing_subscriber::EnvFilter;

/// Default filter directives. Backend crates are noisy at `trace`.
pub const DEFAULT_FILTER: &str = "debug,wgpu_core=info,wgpu_hal=info,naga=info";

/// Install a `fmt` subscriber using `RUST_LOG` if set, [`DEFAULT_FILTER`] otherwise.
pub fn init() {
    init_with_filter(DEFAULT_FILTER);
}

/// Install a `fmt` subscriber with the given fallback filter.
///
/// Calling this more than once is harmless; later calls are ignored.
pub fn init_with_filter(fallback: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_err()
    {
        tracing::trace!("tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_does_not_panic() {
        init_with_filter("warn");
        init_with_filter("warn");
    }
}
