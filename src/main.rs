//! sharelog-core — process entry point.
//!
//! HTTP routing is an external collaborator (§1): this binary only demonstrates the
//! init-then-use lifecycle for the process-wide configuration and JWE/JWS key
//! material, then hands off to whatever request-handling layer a deployment wires
//! in. There is no server loop here.

use std::panic;

use sharelog_core::config::Config;

fn main() -> anyhow::Result<()> {
    panic::set_hook(Box::new(|panic_info| {
        eprintln!("sharelog-core fatal error:");
        eprintln!("{panic_info}");
        if let Some(location) = panic_info.location() {
            eprintln!("location: {}:{}:{}", location.file(), location.line(), location.column());
        }
    }));

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    log::info!("sharelog-core v{} starting", sharelog_core::VERSION);

    let config = Config::init_global()?;
    log::info!(
        "configuration loaded: pbkdf2_iterations={}, min_password_len={}",
        config.pbkdf2_iterations,
        config.password_policy.min_len
    );

    sharelog_core::auth::KeyMaterial::init_global(&config.key_paths)
        .map_err(|e| anyhow::anyhow!("failed to load JWE/JWS key material: {e}"))?;
    log::info!("JWE/JWS key material loaded");

    log::info!(
        "engine ready; no server loop runs here — wire an HTTP collaborator against \
         `sharelog_core::auth`, `sharelog_core::permission`, and `sharelog_core::logcrypt`"
    );

    Ok(())
}
