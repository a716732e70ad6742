// Logging setup
//
// env_logger behind the `log` facade. Optionally pipes everything into a
// log file so validation-layer output survives the window closing.

use crate::config::DebugConfig;
use env_logger::{Builder, Target};
use log::LevelFilter;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize the global logger. Subsequent calls are ignored.
///
/// Filter precedence: `debug.log_filter`, then `RUST_LOG`, then `info`.
pub fn init_logging(config: &DebugConfig) {
    INIT.call_once(|| {
        let mut builder = Builder::new();

        if let Some(filter) = &config.log_filter {
            builder.parse_filters(filter);
        } else if let Ok(filter) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filter);
        } else {
            builder.filter_level(LevelFilter::Info);
        }

        let mut file_error = None;
        if config.log_to_file {
            match OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&config.log_file)
            {
                Ok(mut file) => {
                    let _ = writeln!(file, "=== Triangle Renderer Log ===");
                    let _ = writeln!(file, "Started: {:?}", std::time::SystemTime::now());
                    let _ = writeln!(file);
                    builder.target(Target::Pipe(Box::new(file)));
                }
                Err(e) => file_error = Some(e),
            }
        }

        builder.init();

        if let Some(e) = file_error {
            log::warn!("Could not open log file {:?}: {}", config.log_file, e);
        }
        log::debug!("logging initialized");
    });
}
