//! Link-time presence probe for `mallctl`.
//!
//! With the `jemalloc` feature the entry point is linked statically through
//! `tikv-jemalloc-sys`. Without it, a jemalloc injected with `LD_PRELOAD` (or
//! linked by a C dependency) is still visible through the dynamic symbol table.

use crate::ctl::MallctlFn;

cfg_if::cfg_if! {
    if #[cfg(feature = "jemalloc")] {
        pub fn mallctl_entry() -> Option<MallctlFn> {
            Some(tikv_jemalloc_sys::mallctl as MallctlFn)
        }
    } else {
        pub fn mallctl_entry() -> Option<MallctlFn> {
            let sym = unsafe { libc::dlsym(libc::RTLD_DEFAULT, c"mallctl".as_ptr()) };
            if sym.is_null() {
                None
            } else {
                Some(unsafe { std::mem::transmute::<*mut libc::c_void, MallctlFn>(sym) })
            }
        }
    }
}
