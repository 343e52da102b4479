//! Logging utilities and structured logging support
//!
//! The library itself only talks to the `log` facade. Binaries (and anything
//! else that owns `main`) call [`init`] once to install `env_logger`, which
//! honours `RUST_LOG`.

pub use log::{debug, info, warn, error, trace};

/// Initialize the logging system
///
/// Defaults to `info` when `RUST_LOG` is not set. Calling this twice is
/// harmless; the second installation attempt is ignored.
pub fn init() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
