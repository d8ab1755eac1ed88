//! Runtime heap introspection and control for glibc malloc and jemalloc.
//!
//! The allocator in use is detected once per process. [`heap_usage`] reports
//! the same `{ used, total }` view whichever one it is, while [`standard`] and
//! [`ctl`] expose the backend-specific operations.
//!
//! ## Backends
//!
//! - **standard**: glibc malloc (`mallinfo2`, `malloc_info`, `malloc_stats`,
//!   `malloc_trim`). Enable `legacy-mallinfo` for glibc older than 2.33.
//! - **control-channel**: jemalloc's `mallctl`, either linked with the
//!   `jemalloc` feature or found in the process at runtime.
//!
//! Set `HEAPCTL_BACKEND=standard` to ignore a linked jemalloc.

#[cfg(not(all(target_os = "linux", target_env = "gnu")))]
compile_error!("heapctl requires glibc (linux-gnu targets)");

pub mod backend;
pub mod config;
pub mod ctl;
mod error;
pub mod exports;
pub mod normalize;
pub mod output;
mod probe;
pub mod standard;

pub use backend::{Backend, BackendKind};
pub use error::{errno_name, Error, NativeCode, Result};
pub use exports::Exports;
pub use output::{format_bytes, Format};

use serde::Serialize;

/// Backend-agnostic heap usage, in bytes.
///
/// `total >= used` holds in practice but is not enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct HeapUsage {
    pub used: u64,
    pub total: u64,
}

/// Heap usage from the process-wide backend.
///
/// # Examples
///
/// ```rust
/// let usage = heapctl::heap_usage().unwrap();
/// println!("{} / {} bytes", usage.used, usage.total);
/// ```
pub fn heap_usage() -> Result<HeapUsage> {
    backend::global().heap_usage()
}

/// Name of the process-wide backend, `"standard"` or `"control-channel"`.
pub fn backend_name() -> &'static str {
    backend::global().name()
}
