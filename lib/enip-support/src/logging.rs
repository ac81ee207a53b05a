use sloggers::{Config, LoggerConfig};

/// Builds a terminal logger at the given level ("trace", "debug", "info", "warn", "error").
///
/// Falls back to "info" if `level` isn't one `sloggers` recognizes.
pub fn init(level: &str) -> slog::Logger {
    let toml = format!(
        r#"
type = "terminal"
level = "{}"
destination = "stderr"
"#,
        level
    );

    let config: LoggerConfig = serdeconv::from_toml_str(&toml).unwrap_or_else(|_| {
        serdeconv::from_toml_str(
            r#"
type = "terminal"
level = "info"
destination = "stderr"
"#,
        )
        .expect("built-in fallback logger config must parse")
    });

    config.build_logger().expect("failed to build logger")
}
