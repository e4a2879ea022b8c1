#[cfg(test)]
mod tests {
    use crate::logging::init_logging;
    use std::env;
    use std::sync::Once;
    use tracing::{debug, error, info, trace, warn};

    // The global subscriber can only be installed once per process
    static INIT: Once = Once::new();

    fn init_logger_once() {
        INIT.call_once(|| {
            let original = env::var("RUST_LOG").ok();
            env::set_var("RUST_LOG", "debug");

            init_logging();

            match original {
                Some(val) => env::set_var("RUST_LOG", val),
                None => env::remove_var("RUST_LOG"),
            }
        });
    }

    #[test]
    fn test_init_logging() {
        init_logger_once();
    }

    #[test]
    fn test_init_logging_twice_is_harmless() {
        init_logger_once();
        init_logging();
    }

    #[test]
    fn test_logging_macros() {
        init_logger_once();

        trace!("Test trace log");
        debug!("Test debug log");
        info!("Test info log");
        warn!("Test warn log");
        error!("Test error log");

        info!(version = 3, table = "schema_migrations", "Structured log");
    }
}
