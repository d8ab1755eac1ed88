//! jemalloc control channel.
//!
//! Every operation goes through the single native entry point
//! `mallctl(name, oldp, oldlenp, newp, newlen)`. Values are described by a
//! [`PropertyType`] tag which selects the buffer width and the encoding, so
//! one read path and one write path cover every supported type.
//!
//! Many statistics (`stats.*`) are cached by jemalloc and only refreshed when
//! the epoch is advanced, see [`ControlChannel::update_snapshot`].

mod property;

pub use property::{PropertyType, PropertyValue};

use crate::error::{Error, Result};
use property::Slot;
use std::ffi::CString;
use std::ptr;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, trace};

/// Signature of jemalloc's `mallctl`.
pub type MallctlFn = unsafe extern "C" fn(
    name: *const libc::c_char,
    oldp: *mut libc::c_void,
    oldlenp: *mut libc::size_t,
    newp: *mut libc::c_void,
    newlen: libc::size_t,
) -> libc::c_int;

pub const EPOCH: &str = "epoch";
pub const TCACHE_FLUSH: &str = "thread.tcache.flush";
pub const STATS_ALLOCATED: &str = "stats.allocated";
pub const STATS_MAPPED: &str = "stats.mapped";
pub const STATS_RETAINED: &str = "stats.retained";

/// Typed access to the allocator's named properties.
#[derive(Clone, Copy)]
pub struct ControlChannel {
    mallctl: MallctlFn,
}

impl std::fmt::Debug for ControlChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlChannel")
            .field("mallctl", &(self.mallctl as *const ()))
            .finish()
    }
}

impl ControlChannel {
    pub fn new(mallctl: MallctlFn) -> Self {
        Self { mallctl }
    }

    /// Reads `name` as `ty`.
    pub fn read(&self, name: &str, ty: PropertyType) -> Result<PropertyValue> {
        let cname = property_name(name)?;
        if ty == PropertyType::Void {
            self.call(name, &cname, ptr::null_mut(), ptr::null_mut(), ptr::null_mut(), 0)?;
            return Ok(PropertyValue::Void);
        }

        let mut slot = Slot::zeroed();
        let mut len = ty.width();
        self.call(
            name,
            &cname,
            slot.as_mut_ptr(),
            &mut len,
            ptr::null_mut(),
            0,
        )?;
        trace!(name, %ty, "mallctl read");
        // mallctl only ever stores a pointer to static or allocator-owned storage for strings
        Ok(unsafe { slot.decode(ty) })
    }

    /// Reads a `size_t` property, the common case for `stats.*`.
    pub fn read_size(&self, name: &str) -> Result<usize> {
        match self.read(name, PropertyType::Size)? {
            PropertyValue::Size(v) => Ok(v),
            _ => unreachable!("Size read decodes as Size"),
        }
    }

    /// Writes `value` with only the input side of the call populated.
    pub fn write(&self, name: &str, value: &PropertyValue) -> Result<()> {
        let cname = property_name(name)?;
        if *value == PropertyValue::Void {
            return self.call(name, &cname, ptr::null_mut(), ptr::null_mut(), ptr::null_mut(), 0);
        }

        let mut slot = Slot::zeroed();
        let width = slot.encode(value)?;
        self.call(
            name,
            &cname,
            ptr::null_mut(),
            ptr::null_mut(),
            slot.as_mut_ptr(),
            width,
        )?;
        trace!(name, %value, "mallctl write");
        Ok(())
    }

    /// Casts `source` to `ty`'s native width and writes it.
    pub fn write_narrowed(&self, name: &str, ty: PropertyType, source: i64) -> Result<()> {
        let value = PropertyValue::narrowed(ty, source)?;
        self.write(name, &value)
    }

    /// Issues a no-value call, for properties that only trigger a side effect.
    pub fn trigger(&self, name: &str) -> Result<()> {
        self.write(name, &PropertyValue::Void)
    }

    /// Advances the epoch so cached statistics are refreshed. Returns the value written.
    pub fn update_snapshot(&self) -> Result<u64> {
        let epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(1);
        self.write(EPOCH, &PropertyValue::U64(epoch))?;
        debug!(epoch, "advanced allocator epoch");
        Ok(epoch)
    }

    /// Flushes the calling thread's cache. Best effort, failures are ignored.
    pub fn flush_thread_cache(&self) {
        if let Err(e) = self.trigger(TCACHE_FLUSH) {
            trace!("ignoring tcache flush failure: {}", e);
        }
    }

    fn call(
        &self,
        name: &str,
        cname: &CString,
        oldp: *mut libc::c_void,
        oldlenp: *mut libc::size_t,
        newp: *mut libc::c_void,
        newlen: libc::size_t,
    ) -> Result<()> {
        let ret = unsafe { (self.mallctl)(cname.as_ptr(), oldp, oldlenp, newp, newlen) };
        if ret != 0 {
            return Err(Error::native(format!("mallctl(\"{}\")", name), ret));
        }
        Ok(())
    }
}

fn property_name(name: &str) -> Result<CString> {
    CString::new(name)
        .map_err(|_| Error::argument(format!("property name {:?} contains a NUL byte", name)))
}


#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> ControlChannel {
        ControlChannel::new(fake::mallctl)
    }

    #[test]
    fn test_read_typed_properties() {
        let ctl = channel();
        assert_eq!(ctl.read_size(STATS_ALLOCATED).unwrap(), 1000);
        assert_eq!(
            ctl.read("arenas.narenas", PropertyType::U32).unwrap(),
            PropertyValue::U32(4)
        );
        assert_eq!(
            ctl.read("arenas.dirty_decay_ms", PropertyType::SSize).unwrap(),
            PropertyValue::SSize(10_000)
        );
        assert_eq!(
            ctl.read("version", PropertyType::Str).unwrap(),
            PropertyValue::Str(fake::VERSION.to_string_lossy().into_owned())
        );
    }

    #[test]
    fn test_bool_read_after_write() {
        let ctl = channel();
        let before = ctl.read("background_thread", PropertyType::Bool).unwrap();
        assert_eq!(before, PropertyValue::Bool(false));

        ctl.write("background_thread", &PropertyValue::Bool(true))
            .unwrap();
        assert_eq!(
            ctl.read("background_thread", PropertyType::Bool).unwrap(),
            PropertyValue::Bool(true)
        );
    }

    #[test]
    fn test_write_narrowed() {
        let ctl = channel();
        ctl.write_narrowed("arenas.narenas", PropertyType::U32, (1i64 << 32) + 7)
            .unwrap();
        assert_eq!(
            ctl.read("arenas.narenas", PropertyType::U32).unwrap(),
            PropertyValue::U32(7)
        );

        ctl.write_narrowed("arenas.dirty_decay_ms", PropertyType::SSize, -1)
            .unwrap();
        assert_eq!(
            ctl.read("arenas.dirty_decay_ms", PropertyType::SSize).unwrap(),
            PropertyValue::SSize(-1)
        );
    }

    #[test]
    fn test_unknown_property_reports_symbolic_errno() {
        let err = channel()
            .read("no.such.property", PropertyType::Size)
            .unwrap_err();
        match err {
            Error::NativeCall { call, code } => {
                assert!(call.contains("no.such.property"));
                assert_eq!(code.name, "ENOENT");
                assert!(!code.description().is_empty());
            }
            other => panic!("expected NativeCall, got {other:?}"),
        }
    }

    #[test]
    fn test_width_mismatch_is_einval() {
        let err = channel()
            .read(STATS_ALLOCATED, PropertyType::U32)
            .unwrap_err();
        assert!(err.to_string().contains("EINVAL"), "got: {err}");
    }

    #[test]
    fn test_read_only_string_write_rejected() {
        let err = channel()
            .write("version", &PropertyValue::Str("x".into()))
            .unwrap_err();
        assert!(matches!(err, Error::Argument(_)));
    }

    #[test]
    fn test_nul_in_name_rejected() {
        let err = channel().read("stats\0allocated", PropertyType::Size);
        assert!(matches!(err, Err(Error::Argument(_))));
    }

    #[test]
    fn test_update_snapshot_writes_epoch() {
        let ctl = channel();
        let written = ctl.update_snapshot().unwrap();
        assert_eq!(
            ctl.read(EPOCH, PropertyType::U64).unwrap(),
            PropertyValue::U64(written)
        );
    }

    #[test]
    fn test_update_snapshot_surfaces_errors() {
        fake::fail(EPOCH, libc::EAGAIN);
        let err = channel().update_snapshot().unwrap_err();
        assert!(err.to_string().contains("EAGAIN"), "got: {err}");
    }

    #[test]
    fn test_flush_thread_cache_is_best_effort() {
        let ctl = channel();
        ctl.flush_thread_cache();
        assert_eq!(fake::flushes(), 1);

        fake::fail(TCACHE_FLUSH, libc::EFAULT);
        ctl.flush_thread_cache();
        assert_eq!(fake::flushes(), 1);
    }

    #[test]
    fn test_void_read_triggers() {
        let ctl = channel();
        assert_eq!(
            ctl.read(TCACHE_FLUSH, PropertyType::Void).unwrap(),
            PropertyValue::Void
        );
        assert_eq!(fake::flushes(), 1);
    }
}
