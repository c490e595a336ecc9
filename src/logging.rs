//! Logging setup
//!
//! Everything logs through the standard `log` facade; this just wires up
//! env_logger. `RUST_LOG` overrides the default level chosen here.

/// Initialize logging. Safe to call more than once (later calls are
/// no-ops), so tests can initialize freely.
pub fn init(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default),
    )
    .try_init();
}
