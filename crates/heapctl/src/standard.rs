//! glibc malloc adapter.
//!
//! Wraps `malloc_info`, `malloc_stats`, `mallinfo2` (or `mallinfo` with the
//! `legacy-mallinfo` feature) and `malloc_trim`.

mod sink;

use crate::error::{Error, Result};
use crate::normalize::normalize;
use crate::HeapUsage;
use serde::Serialize;
use sink::MemSink;
use tracing::debug;

/// Snapshot of glibc's `struct mallinfo2`, every field normalized to `u64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StandardStats {
    /// Non-mmapped space allocated (bytes)
    pub arena: u64,
    /// Number of free chunks
    pub ordblks: u64,
    /// Number of free fastbin blocks
    pub smblks: u64,
    /// Number of mmapped regions
    pub hblks: u64,
    /// Space allocated in mmapped regions (bytes)
    pub hblkhd: u64,
    /// Maximum total allocated space (always 0 on modern glibc)
    pub usmblks: u64,
    /// Space in freed fastbin blocks (bytes)
    pub fsmblks: u64,
    /// Total allocated space (bytes)
    pub uordblks: u64,
    /// Total free space (bytes)
    pub fordblks: u64,
    /// Top-most, releasable space (bytes)
    pub keepcost: u64,
}

impl From<StandardStats> for HeapUsage {
    fn from(stats: StandardStats) -> Self {
        HeapUsage {
            used: stats.uordblks,
            total: stats.arena,
        }
    }
}

macro_rules! normalize_mallinfo {
    ($raw:expr) => {{
        let raw = $raw;
        StandardStats {
            arena: normalize(raw.arena),
            ordblks: normalize(raw.ordblks),
            smblks: normalize(raw.smblks),
            hblks: normalize(raw.hblks),
            hblkhd: normalize(raw.hblkhd),
            usmblks: normalize(raw.usmblks),
            fsmblks: normalize(raw.fsmblks),
            uordblks: normalize(raw.uordblks),
            fordblks: normalize(raw.fordblks),
            keepcost: normalize(raw.keepcost),
        }
    }};
}

cfg_if::cfg_if! {
    if #[cfg(feature = "legacy-mallinfo")] {
        /// Layout name reported alongside the stats.
        pub const STATS_LAYOUT: &str = "mallinfo";

        #[allow(deprecated)]
        fn query_stats() -> StandardStats {
            // int fields, may have wrapped
            normalize_mallinfo!(unsafe { libc::mallinfo() })
        }
    } else {
        /// Layout name reported alongside the stats.
        pub const STATS_LAYOUT: &str = "mallinfo2";

        fn query_stats() -> StandardStats {
            normalize_mallinfo!(unsafe { libc::mallinfo2() })
        }
    }
}

/// XML report from `malloc_info(0, ...)`, captured through an in-memory stream.
pub fn diagnostic_report() -> Result<String> {
    capture_report().map(|(report, _)| report)
}

/// The report and the size the sink reported for it.
fn capture_report() -> Result<(String, usize)> {
    let mut sink = MemSink::open()?;

    let ret = unsafe { libc::malloc_info(0, sink.file()) };
    if ret != 0 {
        let errno = std::io::Error::last_os_error()
            .raw_os_error()
            .filter(|&e| e != 0)
            .unwrap_or(libc::EIO);
        return Err(Error::native("malloc_info", errno));
    }

    let bytes = sink.contents()?;
    debug!(len = bytes.len(), "captured malloc_info report");
    Ok((String::from_utf8_lossy(&bytes).into_owned(), sink.len()))
}

/// Runs `malloc_stats()`. glibc prints straight to stderr; nothing is returned.
pub fn dump_global_stats() {
    unsafe { libc::malloc_stats() };
}

/// One `mallinfo` query with every field normalized.
pub fn snapshot_stats() -> StandardStats {
    query_stats()
}

/// Releases free memory at the top of the heap, keeping at least `pad` bytes.
///
/// Returns 1 if memory was released back to the OS, 0 otherwise.
pub fn trim(pad: usize) -> i32 {
    let released = unsafe { libc::malloc_trim(pad) };
    debug!(pad, released, "malloc_trim");
    if released != 0 {
        1
    } else {
        0
    }
}

pub fn usage() -> HeapUsage {
    snapshot_stats().into()
}
