//! Runtime configuration
//!
//! Defaults can be overridden through environment variables, read once by
//! [`Config::from_env`].

use std::str::FromStr;

use log::warn;

use crate::event::CursorKind;

/// Which platform backend to open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendPreference {
    /// Wayland, then X11 on Unix; Win32 on Windows
    #[default]
    Auto,
    Wayland,
    X11,
    Win32,
}

impl FromStr for BackendPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(Self::Auto),
            "wayland" => Ok(Self::Wayland),
            "x11" | "xlib" => Ok(Self::X11),
            "win32" | "windows" => Ok(Self::Win32),
            other => Err(format!("unknown backend '{other}'")),
        }
    }
}

/// Window manager configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend selection (`GLWM_BACKEND`)
    pub backend: BackendPreference,
    /// Swap interval applied to every window surface (`GLWM_SWAP_INTERVAL`)
    pub swap_interval: u32,
    /// Requested desktop OpenGL version (`GLWM_GL_VERSION`, "major.minor")
    pub gl_version: (u8, u8),
    /// Number of formatted log entries kept in memory (`GLWM_LOG_CAPACITY`)
    pub log_capacity: usize,
    /// `env_logger` style filter (`RUST_LOG`)
    pub log_filter: String,
    /// Cursor shown until [`crate::WindowManager::set_cursor`] is called
    pub default_cursor: CursorKind,
    /// Record every buffer swap as a `METRICS` debug entry (`GLWM_TIME_SWAPS`)
    pub time_swaps: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendPreference::Auto,
            swap_interval: 1,
            gl_version: (3, 3),
            log_capacity: 1024,
            log_filter: "info".to_string(),
            default_cursor: CursorKind::Arrow,
            time_swaps: false,
        }
    }
}

impl Config {
    /// Build a configuration from the defaults and the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("GLWM_BACKEND") {
            match value.parse() {
                Ok(backend) => config.backend = backend,
                Err(e) => warn!("Ignoring GLWM_BACKEND: {}", e),
            }
        }

        if let Some(value) = lookup("GLWM_SWAP_INTERVAL") {
            match value.trim().parse() {
                Ok(interval) => config.swap_interval = interval,
                Err(_) => warn!("Ignoring GLWM_SWAP_INTERVAL '{}'", value),
            }
        }

        if let Some(value) = lookup("GLWM_GL_VERSION") {
            match parse_gl_version(&value) {
                Some(version) => config.gl_version = version,
                None => warn!("Ignoring GLWM_GL_VERSION '{}'", value),
            }
        }

        if let Some(value) = lookup("GLWM_LOG_CAPACITY") {
            match value.trim().parse::<usize>() {
                Ok(capacity) if capacity > 0 => config.log_capacity = capacity,
                _ => warn!("Ignoring GLWM_LOG_CAPACITY '{}'", value),
            }
        }

        if let Some(value) = lookup("GLWM_TIME_SWAPS") {
            match parse_flag(&value) {
                Some(flag) => config.time_swaps = flag,
                None => warn!("Ignoring GLWM_TIME_SWAPS '{}'", value),
            }
        }

        if let Some(value) = lookup("RUST_LOG") {
            if !value.trim().is_empty() {
                config.log_filter = value;
            }
        }

        config
    }
}

fn parse_gl_version(value: &str) -> Option<(u8, u8)> {
    let (major, minor) = value.trim().split_once('.')?;
    let major = major.parse().ok()?;
    let minor = minor.parse().ok()?;
    (major > 0).then_some((major, minor))
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[]));
        assert_eq!(config.backend, BackendPreference::Auto);
        assert_eq!(config.swap_interval, 1);
        assert_eq!(config.gl_version, (3, 3));
        assert_eq!(config.log_capacity, 1024);
        assert_eq!(config.log_filter, "info");
        assert!(!config.time_swaps);
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("GLWM_BACKEND", "X11"),
            ("GLWM_SWAP_INTERVAL", "0"),
            ("GLWM_GL_VERSION", "4.6"),
            ("GLWM_LOG_CAPACITY", "16"),
            ("GLWM_TIME_SWAPS", "yes"),
            ("RUST_LOG", "debug"),
        ]));
        assert_eq!(config.backend, BackendPreference::X11);
        assert_eq!(config.swap_interval, 0);
        assert_eq!(config.gl_version, (4, 6));
        assert_eq!(config.log_capacity, 16);
        assert_eq!(config.log_filter, "debug");
        assert!(config.time_swaps);
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = Config::from_lookup(lookup(&[
            ("GLWM_BACKEND", "cocoa"),
            ("GLWM_SWAP_INTERVAL", "-1"),
            ("GLWM_GL_VERSION", "three"),
            ("GLWM_LOG_CAPACITY", "0"),
            ("GLWM_TIME_SWAPS", "sometimes"),
        ]));
        assert_eq!(config.backend, BackendPreference::Auto);
        assert_eq!(config.swap_interval, 1);
        assert_eq!(config.gl_version, (3, 3));
        assert_eq!(config.log_capacity, 1024);
        assert!(!config.time_swaps);
    }

    #[test]
    fn test_backend_parse() {
        assert_eq!("wayland".parse(), Ok(BackendPreference::Wayland));
        assert_eq!("Windows".parse(), Ok(BackendPreference::Win32));
        assert!("metal".parse::<BackendPreference>().is_err());
    }
}
