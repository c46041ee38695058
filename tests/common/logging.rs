use tracing_subscriber::EnvFilter;
use tracing_subscriber::FmtSubscriber;

/// Route `cryptbox` events to the test output.
///
/// Integration tests are compiled as separate crates, where `#[traced_test]`
/// only captures events of the test crate itself. Call this first in each
/// test instead; a process has a single global subscriber, so the two
/// cannot be combined.
pub fn tracing_logger() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("cryptbox=trace,warn"));
    let subscriber = FmtSubscriber::builder()
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_env_filter(filter)
        .with_test_writer()
        .finish();

    // already installed by an earlier test in this binary
    let _result = tracing::subscriber::set_global_default(subscriber);
}
