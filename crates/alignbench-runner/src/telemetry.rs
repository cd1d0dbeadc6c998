//! Log setup for the `alignbench` binary.
//!
//! Everything is logged to stderr: stdout carries command output such as the
//! expanded job list. Without `RUST_LOG`, the alignbench crates log at the
//! requested level and every other crate (reqwest, hyper, rustls) only logs
//! warnings. `--json` switches to one JSON object per line for collecting
//! runs from batch schedulers.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber. Only the first call in a process has an
/// effect.
pub fn init_tracing(json: bool, level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let text = (!json).then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
    });
    let lines = json.then(|| {
        fmt::layer()
            .json()
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(text)
        .with(lines)
        .try_init();
}

fn default_directives(level: Level) -> String {
    ["alignbench", "alignbench_runner", "alignbench_types"]
        .iter()
        .fold(String::from("warn"), |acc, krate| format!("{acc},{krate}={level}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_parse() {
        let directives = default_directives(Level::DEBUG);
        assert!(directives.contains("alignbench_runner=DEBUG"));
        assert!(EnvFilter::try_new(directives).is_ok());
    }

    #[test]
    fn test_init_tracing_twice_is_harmless() {
        init_tracing(false, Level::INFO);
        init_tracing(true, Level::DEBUG);
        tracing::info!("still logging");
    }
}
