use tracing::Level;

/// JSON logging for Lambda; CloudWatch stamps the time itself.
pub fn init(level: Level) {
    tracing_subscriber::fmt()
        .json()
        .with_max_level(level)
        .with_current_span(false)
        .with_span_list(false)
        .with_ansi(false)
        .without_time()
        .with_target(false)
        .with_line_number(true)
        .init();
}

/// Human readable logging for the operator tooling.
pub fn init_cli(level: Level) {
    tracing_subscriber::fmt()
        .compact()
        .with_max_level(level)
        .with_target(false)
        .without_time()
        .init();
}

pub fn parse_level(value: Option<&str>) -> Level {
    value
        .and_then(|v| v.trim().parse::<Level>().ok())
        .unwrap_or(Level::INFO)
}
