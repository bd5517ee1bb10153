use brewline_core::config::{AppConfig, LoadOptions};

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let summary = config.redacted_summary();
    let rendered =
        serde_json::to_string_pretty(&summary).unwrap_or_else(|_| summary.to_string());

    format!(
        "effective config (source precedence: flags > env > file > default):\n{rendered}"
    )
}
