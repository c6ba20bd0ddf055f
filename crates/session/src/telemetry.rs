//! Tracing subscriber setup

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

/// Install the global subscriber
///
/// Natively `RUST_LOG` wins over `level`; in the browser output goes to the
/// developer console. Calling this again once a subscriber is set returns an
/// error and changes nothing.
#[cfg(not(target_arch = "wasm32"))]
pub fn init_tracing(level: Level) -> Result<(), TryInitError> {
    use tracing_subscriber::EnvFilter;

    let level_str = level.as_str().to_lowercase();
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("console_session={level_str},console_http={level_str}").into()
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
}

#[cfg(target_arch = "wasm32")]
pub fn init_tracing(level: Level) -> Result<(), TryInitError> {
    use tracing_subscriber::filter::LevelFilter;
    use tracing_web::MakeWebConsoleWriter;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .without_time()
        .with_writer(MakeWebConsoleWriter::new());

    tracing_subscriber::registry()
        .with(LevelFilter::from_level(level))
        .with(fmt_layer)
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_rejected() {
        let _ = init_tracing(Level::DEBUG);
        assert!(init_tracing(Level::INFO).is_err());
    }
}
