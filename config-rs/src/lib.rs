//! config-rs/lib.rs
//! Shared configuration utilities for the civic pipeline binaries.
//! Provides bind address resolution, `.env` loading and typed env lookups.

use std::env;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

mod logging;
pub use logging::init_tracing;

/// Load variables from a `.env` file in the working directory, if one exists.
///
/// Returns the file that was loaded. Runs before tracing is installed, so
/// callers log the outcome once [`init_tracing`] has run.
pub fn load_env() -> Option<PathBuf> {
    dotenv::dotenv().ok()
}

/// Get service port from environment variables with proper fallback
///
/// # Arguments
/// * `service_name` - The name of the service (e.g., "GATEWAY")
/// * `default_port` - The default port to use if not specified in environment
pub fn get_service_port(service_name: &str, default_port: u16) -> u16 {
    let var_name = format!("{}_SERVICE_PORT", service_name.to_uppercase());
    env::var(&var_name)
        .unwrap_or_else(|_| default_port.to_string())
        .parse::<u16>()
        .unwrap_or_else(|_| {
            log::warn!("Invalid port in {}, using default {}", var_name, default_port);
            default_port
        })
}

/// Create a SocketAddr for binding a service
///
/// `{SERVICE}_SERVICE_ADDR` wins when it holds a socket address (optionally
/// prefixed with `http://` or `https://`); otherwise binds all interfaces on
/// the port from [`get_service_port`].
pub fn get_bind_address(service_name: &str, default_port: u16) -> SocketAddr {
    let var_name = format!("{}_SERVICE_ADDR", service_name.to_uppercase());

    if let Ok(addr_str) = env::var(&var_name) {
        let trimmed = addr_str
            .trim_start_matches("http://")
            .trim_start_matches("https://");
        if let Ok(addr) = trimmed.parse::<SocketAddr>() {
            return addr;
        }
        log::warn!("Invalid address format in {}, using default", var_name);
    }

    let port = get_service_port(service_name, default_port);
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))
}

/// Parse a boolean flag; unset or unrecognised values yield `default`
pub fn env_flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(value) => match value.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            other => {
                log::warn!("Invalid boolean in {}: {:?}, using default {}", name, other, default);
                default
            }
        },
        Err(_) => default,
    }
}

/// Path from the environment, or `default` when unset or blank
pub fn env_path(name: &str, default: impl Into<PathBuf>) -> PathBuf {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value.trim()),
        _ => default.into(),
    }
}
