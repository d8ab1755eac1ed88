//! Growable in-memory `FILE*` backed by `open_memstream(3)`.

use crate::error::{Error, Result};
use std::ptr;

/// Owns a memstream and its buffer. Both are released on drop, on every path.
pub(crate) struct MemSink {
    // Boxed so the addresses handed to open_memstream stay put when the sink moves.
    buf: Box<*mut libc::c_char>,
    size: Box<libc::size_t>,
    file: *mut libc::FILE,
}

impl MemSink {
    pub(crate) fn open() -> Result<Self> {
        let mut buf: Box<*mut libc::c_char> = Box::new(ptr::null_mut());
        let mut size: Box<libc::size_t> = Box::new(0);
        let file = unsafe { libc::open_memstream(&mut *buf, &mut *size) };
        if file.is_null() {
            return Err(Error::Resource(std::io::Error::last_os_error()));
        }
        Ok(Self { buf, size, file })
    }

    pub(crate) fn file(&self) -> *mut libc::FILE {
        self.file
    }

    /// Flushes pending writes and returns everything written so far.
    ///
    /// The buffer and size pointers are only updated by glibc on flush/close.
    pub(crate) fn contents(&mut self) -> Result<Vec<u8>> {
        if unsafe { libc::fflush(self.file) } != 0 {
            return Err(Error::Resource(std::io::Error::last_os_error()));
        }
        let data = *self.buf;
        let len = *self.size;
        if data.is_null() || len == 0 {
            return Ok(Vec::new());
        }
        let bytes = unsafe { std::slice::from_raw_parts(data as *const u8, len) };
        Ok(bytes.to_vec())
    }

    pub(crate) fn len(&self) -> usize {
        *self.size
    }
}

impl Drop for MemSink {
    fn drop(&mut self) {
        unsafe {
            if !self.file.is_null() {
                libc::fclose(self.file);
            }
            if !(*self.buf).is_null() {
                libc::free(*self.buf as *mut libc::c_void);
            }
        }
    }
}
