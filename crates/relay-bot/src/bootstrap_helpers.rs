use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

/// Bare words parse as target directives, so only a level name or an
/// explicit `target=level` pair is accepted.
pub(crate) fn default_directive(log_level: &str) -> Directive {
    let log_level = log_level.trim();
    if let Ok(level) = log_level.parse::<LevelFilter>() {
        return level.into();
    }
    if log_level.contains('=') {
        if let Ok(directive) = log_level.parse::<Directive>() {
            return directive;
        }
    }
    LevelFilter::INFO.into()
}

pub(crate) fn init_tracing(log_level: &str) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_directive(log_level))
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

#[cfg(test)]
mod tests {
    use super::default_directive;

    #[test]
    fn unit_default_directive_falls_back_to_info() {
        assert_eq!(default_directive("debug").to_string(), "debug");
        assert_eq!(default_directive(" WARN ").to_string(), "warn");
        assert_eq!(default_directive("relay_runtime=trace").to_string(), "relay_runtime=trace");
        assert_eq!(default_directive("not a level!").to_string(), "info");
    }

    #[test]
    fn regression_default_directive_rejects_mistyped_level() {
        assert_eq!(default_directive("inf").to_string(), "info");
        assert_eq!(default_directive("relay=loud").to_string(), "info");
    }
}
