// Logging setup

use tracing::Level;

/// Parses a log level name; unknown names yield `None`
pub fn parse_level(name: &str) -> Option<Level> {
    match name.trim().to_ascii_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Picks the tracing level from CLI flags and the configured default
///
/// `--debug` wins over `--quiet`, which wins over the configured level.
pub fn effective_level(debug: bool, quiet: bool, configured: Option<&str>) -> Level {
    if debug {
        Level::DEBUG
    } else if quiet {
        Level::ERROR
    } else {
        configured.and_then(parse_level).unwrap_or(Level::INFO)
    }
}

/// Initialize logging based on CLI flags
///
/// Installs a fmt subscriber writing to stderr. A subscriber that is already
/// installed is left in place.
pub fn init_logging(debug: bool, quiet: bool, configured: Option<&str>) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(effective_level(debug, quiet, configured))
        .with_target(debug)
        .with_file(debug)
        .with_line_number(debug)
        .with_writer(std::io::stderr)
        .try_init();
}
