//! Backend detection and the unified heap usage query.

use crate::config::{BackendPreference, BACKEND_PREFERENCE};
use crate::ctl::{ControlChannel, MallctlFn, STATS_ALLOCATED, STATS_MAPPED, STATS_RETAINED};
use crate::error::Result;
use crate::{probe, standard, HeapUsage};
use std::fmt;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Which allocator answers the queries. Fixed for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Standard,
    ControlChannel,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Standard => "standard",
            BackendKind::ControlChannel => "control-channel",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Backend {
    kind: BackendKind,
    ctl: Option<ControlChannel>,
}

static BACKEND: OnceLock<Backend> = OnceLock::new();

/// The process-wide backend, probed on first use.
pub fn global() -> &'static Backend {
    BACKEND.get_or_init(Backend::detect)
}

impl Backend {
    /// Probes for `mallctl` and applies `HEAPCTL_BACKEND`.
    ///
    /// Prefer [`global`], which caches the result.
    pub fn detect() -> Self {
        Self::from_probe(probe::mallctl_entry(), *BACKEND_PREFERENCE)
    }

    /// Builds a backend from an already-probed entry point.
    pub fn from_probe(entry: Option<MallctlFn>, preference: BackendPreference) -> Self {
        let backend = match (entry, preference) {
            (Some(_), BackendPreference::Standard) => Self::standard(),
            (Some(mallctl), _) => Self {
                kind: BackendKind::ControlChannel,
                ctl: Some(ControlChannel::new(mallctl)),
            },
            (None, BackendPreference::ControlChannel) => {
                warn!("control channel requested but mallctl is not linked, using standard backend");
                Self::standard()
            }
            (None, _) => Self::standard(),
        };
        debug!(backend = backend.name(), %preference, "allocator backend selected");
        backend
    }

    fn standard() -> Self {
        Self {
            kind: BackendKind::Standard,
            ctl: None,
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// `"standard"` or `"control-channel"`.
    pub fn name(&self) -> &'static str {
        self.kind.as_str()
    }

    /// The control channel, present only on the control-channel backend.
    pub fn control_channel(&self) -> Option<&ControlChannel> {
        self.ctl.as_ref()
    }

    /// Bytes in use and bytes held by the allocator.
    ///
    /// On the control channel `total` is `mapped + retained`; the three values
    /// come from one epoch but `total >= used` is not guaranteed.
    pub fn heap_usage(&self) -> Result<HeapUsage> {
        match &self.ctl {
            Some(ctl) => control_channel_usage(ctl),
            None => Ok(standard::usage()),
        }
    }
}

fn control_channel_usage(ctl: &ControlChannel) -> Result<HeapUsage> {
    if let Err(e) = ctl.update_snapshot() {
        warn!("epoch refresh failed, statistics may be stale: {}", e);
    }

    let allocated = ctl.read_size(STATS_ALLOCATED)? as u64;
    let mapped = ctl.read_size(STATS_MAPPED)? as u64;
    let retained = ctl.read_size(STATS_RETAINED)? as u64;

    Ok(HeapUsage {
        used: allocated,
        total: mapped.saturating_add(retained),
    })
}
