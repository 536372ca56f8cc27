//! Shared helpers for tests across the workspace.

use once_cell::sync::Lazy;
use tracing_subscriber::EnvFilter;

static LOG_SETUP: Lazy<()> = Lazy::new(|| {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init()
        .ok();
});

/// Start global logging for the duration of the test run, honoring `RUST_LOG`
/// if set. Safe to call from every test; initialization happens once.
pub fn maybe_start_logging() {
    Lazy::force(&LOG_SETUP);
}

/// Assert that `haystack` (anything `Display`able) contains `needle`, with a
/// useful failure message.
#[macro_export]
macro_rules! assert_contains {
    ($haystack:expr, $needle:expr) => {
        let haystack = $haystack.to_string();
        let needle = $needle.to_string();
        assert!(
            haystack.contains(&needle),
            "Expected to find {needle:?} in {haystack:?}",
        );
    };
}

/// Assert that a `Result` is an error whose `Display` form contains `needle`.
#[macro_export]
macro_rules! assert_error {
    ($result:expr, $needle:expr) => {
        match &$result {
            Ok(_) => panic!("Expected an error, got Ok"),
            Err(e) => {
                $crate::assert_contains!(e, $needle);
            }
        }
    };
}
