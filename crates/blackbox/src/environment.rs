//! Host metadata bundled into exported archives as `user.json`.

use std::collections::BTreeMap;

use chrono::{Local, SecondsFormat, Utc};
use serde_json::{json, Value};

/// A flat map of host attributes, captured at export time and never persisted.
pub type EnvironmentSnapshot = BTreeMap<String, Value>;

/// Source of [`EnvironmentSnapshot`]s.
pub trait EnvironmentProvider: Send + Sync + std::fmt::Debug {
    /// Capture the current environment.
    fn capture(&self) -> EnvironmentSnapshot;
}

/// Provider that records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyEnvironment;

impl EnvironmentProvider for EmptyEnvironment {
    fn capture(&self) -> EnvironmentSnapshot {
        EnvironmentSnapshot::new()
    }
}

/// Provider that describes the running process and its host.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostEnvironment;

impl EnvironmentProvider for HostEnvironment {
    fn capture(&self) -> EnvironmentSnapshot {
        let mut info = EnvironmentSnapshot::new();
        let offset_seconds = Local::now().offset().local_minus_utc();

        info.insert(
            "timeOpened".into(),
            json!(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        info.insert("timezone".into(), json!(f64::from(offset_seconds) / 3600.0));
        info.insert("os".into(), json!(std::env::consts::OS));
        info.insert("osFamily".into(), json!(std::env::consts::FAMILY));
        info.insert("arch".into(), json!(std::env::consts::ARCH));
        info.insert("processId".into(), json!(std::process::id()));
        info.insert("arguments".into(), json!(std::env::args_os().count()));
        info.insert("recorderVersion".into(), json!(env!("CARGO_PKG_VERSION")));
        info.insert(
            "workingDirectory".into(),
            std::env::current_dir()
                .map(|p| json!(p.display().to_string()))
                .unwrap_or(Value::Null),
        );
        info.insert(
            "executable".into(),
            std::env::current_exe()
                .map(|p| json!(p.display().to_string()))
                .unwrap_or(Value::Null),
        );
        info.insert("locale".into(), json!(locale()));
        info.insert("terminal".into(), json!(std::env::var("TERM").ok()));
        info.insert("terminalColumns".into(), json!(env_number("COLUMNS")));
        info.insert("terminalLines".into(), json!(env_number("LINES")));
        info
    }
}

/// The effective message locale, following POSIX precedence.
fn locale() -> Option<String> {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|value| !value.is_empty())
}

fn env_number(var: &str) -> Option<u32> {
    std::env::var(var).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_environment() {
        assert!(EmptyEnvironment.capture().is_empty());
    }

    #[test]
    fn test_host_environment_fields() {
        let info = HostEnvironment.capture();

        for key in [
            "timeOpened",
            "timezone",
            "os",
            "arch",
            "processId",
            "recorderVersion",
            "locale",
        ] {
            assert!(info.contains_key(key), "missing {key}");
        }
        assert_eq!(info["os"], json!(std::env::consts::OS));
        assert_eq!(info["processId"], json!(std::process::id()));
    }

    #[test]
    fn test_host_environment_serializes() {
        let json = serde_json::to_string(&HostEnvironment.capture()).unwrap();
        assert!(json.starts_with('{'));
        assert!(json.contains("recorderVersion"));
    }
}
