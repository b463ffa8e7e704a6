//! Process-level configuration shared by demos and tools.

use crate::profiling::ProfilingBackend;

/// Environment variable selecting the profiling mode (`off`, `on`, `http`).
pub const PROFILE_ENV: &str = "SPRITEBATCH_PROFILE";

/// Configuration for a spritebatch host application.
#[derive(Debug, Clone)]
pub struct Config {
    pub profiling: ProfilingMode,
    /// Fallback `tracing` filter when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            profiling: ProfilingMode::Off,
            log_filter: crate::logging::DEFAULT_FILTER.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfilingMode {
    /// Profiling is disabled
    Off,
    /// Scopes are recorded in-process
    On,
    /// Scopes are recorded and served to `puffin_viewer`
    WithWebserver,
}

impl ProfilingMode {
    /// Parse a mode name. Unknown names map to `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "0" | "off" | "false" => Some(Self::Off),
            "1" | "on" | "true" => Some(Self::On),
            "http" | "web" | "webserver" => Some(Self::WithWebserver),
            _ => None,
        }
    }
}

impl Config {
    /// Build a config from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(value) = std::env::var(PROFILE_ENV) {
            match ProfilingMode::parse(&value) {
                Some(mode) => config.profiling = mode,
                None => tracing::warn!("Ignoring unknown {PROFILE_ENV} value {value:?}"),
            }
        }
        config
    }

    /// Install logging and profiling according to this config.
    pub fn apply(&self) {
        crate::logging::init_with_filter(&self.log_filter);

        match self.profiling {
            ProfilingMode::Off => {}
            ProfilingMode::On => crate::profiling::init_profiling(ProfilingBackend::InProcess),
            #[cfg(feature = "profiling")]
            ProfilingMode::WithWebserver => {
                crate::profiling::init_profiling(ProfilingBackend::PuffinHttp)
            }
            #[cfg(not(feature = "profiling"))]
            ProfilingMode::WithWebserver => {
                tracing::warn!("Built without the `profiling` feature; recording in-process");
                crate::profiling::init_profiling(ProfilingBackend::InProcess)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_modes() {
        assert_eq!(ProfilingMode::parse("off"), Some(ProfilingMode::Off));
        assert_eq!(ProfilingMode::parse("ON"), Some(ProfilingMode::On));
        assert_eq!(ProfilingMode::parse(" http "), Some(ProfilingMode::WithWebserver));
        assert_eq!(ProfilingMode::parse("sometimes"), None);
    }

    #[test]
    fn test_default_is_off() {
        let config = Config::default();
        assert_eq!(config.profiling, ProfilingMode::Off);
        assert_eq!(config.log_filter, crate::logging::DEFAULT_FILTER);
    }
}
