//! Integration tests wiring providers, resolver, and manager together
//! against an in-memory directory server.

mod test_utils;

/// Route tracing output through the test harness; safe to call from
/// every test, only the first call installs the subscriber.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
