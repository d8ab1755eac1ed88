//! Environment configuration, read once per process.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use tracing::warn;

pub const BACKEND_ENV: &str = "HEAPCTL_BACKEND";

/// Which backend the caller wants when more than one could be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendPreference {
    /// Use the control channel whenever `mallctl` is linked.
    #[default]
    Auto,
    /// Always report through glibc malloc, even if `mallctl` is linked.
    Standard,
    /// Require the control channel. Falls back to the standard backend with a
    /// warning when `mallctl` is absent.
    ControlChannel,
}

impl FromStr for BackendPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(BackendPreference::Auto),
            "standard" | "glibc" => Ok(BackendPreference::Standard),
            "control-channel" | "jemalloc" => Ok(BackendPreference::ControlChannel),
            other => Err(format!(
                "unknown backend '{}', expected auto, standard or control-channel",
                other
            )),
        }
    }
}

impl fmt::Display for BackendPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BackendPreference::Auto => "auto",
            BackendPreference::Standard => "standard",
            BackendPreference::ControlChannel => "control-channel",
        };
        write!(f, "{}", s)
    }
}

pub(crate) static BACKEND_PREFERENCE: LazyLock<BackendPreference> = LazyLock::new(|| {
    backend_preference_from(std::env::var(BACKEND_ENV).ok().as_deref())
});

pub(crate) fn backend_preference_from(raw: Option<&str>) -> BackendPreference {
    let Some(raw) = raw else {
        return BackendPreference::Auto;
    };
    match raw.parse() {
        Ok(pref) => pref,
        Err(e) => {
            warn!("ignoring {}: {}", BACKEND_ENV, e);
            BackendPreference::Auto
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_preference_parsing() {
        let cases = [
            (None, BackendPreference::Auto),
            (Some("auto"), BackendPreference::Auto),
            (Some(" Standard "), BackendPreference::Standard),
            (Some("control-channel"), BackendPreference::ControlChannel),
            (Some("jemalloc"), BackendPreference::ControlChannel),
            (Some("tcmalloc"), BackendPreference::Auto),
        ];

        for (input, expected) in cases {
            assert_eq!(
                backend_preference_from(input),
                expected,
                "failed for input: {input:?}"
            );
        }
    }
}
