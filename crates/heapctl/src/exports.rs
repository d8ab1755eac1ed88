//! Host-facing export surface.
//!
//! Host values are modelled as [`serde_json::Value`]. Every call is checked for
//! arity and argument types before anything reaches the allocator, and the
//! `ctl` namespace only exists when the control channel backend was detected.
//!
//! ```rust
//! use heapctl::Exports;
//! use serde_json::json;
//!
//! let exports = Exports::global();
//! let usage = exports.call("heap_usage", &[]).unwrap();
//! assert!(usage["total"].is_u64());
//!
//! let released = exports.call("standard.trim", &[json!(0)]).unwrap();
//! assert!(released == json!(0) || released == json!(1));
//! ```

use crate::backend::{self, Backend};
use crate::ctl::{ControlChannel, PropertyType, PropertyValue};
use crate::error::{Error, Result};
use crate::standard;
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub const STANDARD_NS: &str = "standard";
pub const CTL_NS: &str = "ctl";
pub const BACKEND_KEY: &str = "backend";
pub const HEAP_USAGE: &str = "heap_usage";

type Handler = fn(&Backend, &[Value]) -> Result<Value>;

#[derive(Clone, Copy)]
enum Export {
    Call(Handler),
    Get(PropertyType),
    Set(PropertyType),
}

pub struct Exports {
    backend: Backend,
    namespaces: BTreeMap<&'static str, BTreeMap<&'static str, Export>>,
}

impl Exports {
    pub fn new(backend: &Backend) -> Self {
        let mut namespaces = BTreeMap::new();

        let mut std_ns: BTreeMap<&'static str, Export> = BTreeMap::new();
        std_ns.insert("diagnostic_report", Export::Call(diagnostic_report));
        std_ns.insert("dump_stats", Export::Call(dump_stats));
        std_ns.insert("snapshot_stats", Export::Call(snapshot_stats));
        std_ns.insert("trim", Export::Call(trim));
        namespaces.insert(STANDARD_NS, std_ns);

        if backend.control_channel().is_some() {
            let mut ctl_ns: BTreeMap<&'static str, Export> = BTreeMap::new();
            ctl_ns.insert("get_size", Export::Get(PropertyType::Size));
            ctl_ns.insert("get_ssize", Export::Get(PropertyType::SSize));
            ctl_ns.insert("get_u32", Export::Get(PropertyType::U32));
            ctl_ns.insert("get_u64", Export::Get(PropertyType::U64));
            ctl_ns.insert("get_string", Export::Get(PropertyType::Str));
            ctl_ns.insert("get_bool", Export::Get(PropertyType::Bool));
            ctl_ns.insert("get_unsigned", Export::Get(PropertyType::Unsigned));
            ctl_ns.insert("set_size", Export::Set(PropertyType::Size));
            ctl_ns.insert("set_ssize", Export::Set(PropertyType::SSize));
            ctl_ns.insert("set_u32", Export::Set(PropertyType::U32));
            ctl_ns.insert("set_u64", Export::Set(PropertyType::U64));
            ctl_ns.insert("set_bool", Export::Set(PropertyType::Bool));
            ctl_ns.insert("trigger", Export::Call(trigger));
            ctl_ns.insert("update_snapshot", Export::Call(update_snapshot));
            ctl_ns.insert("flush_thread_cache", Export::Call(flush_thread_cache));
            namespaces.insert(CTL_NS, ctl_ns);
        }

        Self {
            backend: *backend,
            namespaces,
        }
    }

    /// Exports over the process-wide backend.
    pub fn global() -> Self {
        Self::new(backend::global())
    }

    /// `"standard"` or `"control-channel"`.
    pub fn backend(&self) -> &'static str {
        self.backend.name()
    }

    /// Top-level keys, as a host would see them on the module object.
    pub fn keys(&self) -> Vec<&'static str> {
        let mut keys = vec![BACKEND_KEY, HEAP_USAGE];
        keys.extend(self.namespaces());
        keys
    }

    /// Namespaces present on this backend, sorted.
    pub fn namespaces(&self) -> Vec<&'static str> {
        self.namespaces.keys().copied().collect()
    }

    pub fn has_namespace(&self, name: &str) -> bool {
        self.namespaces.contains_key(name)
    }

    pub fn functions(&self, namespace: &str) -> Option<Vec<&'static str>> {
        self.namespaces
            .get(namespace)
            .map(|ns| ns.keys().copied().collect())
    }

    /// Calls `path` (`"heap_usage"` or `"<namespace>.<function>"`) with host arguments.
    pub fn call(&self, path: &str, args: &[Value]) -> Result<Value> {
        if path == HEAP_USAGE {
            expect_arity(path, args, 0)?;
            let usage = self.backend.heap_usage()?;
            return Ok(json!(usage));
        }
        if path == BACKEND_KEY {
            expect_arity(path, args, 0)?;
            return Ok(Value::String(self.backend().to_string()));
        }

        let export = path
            .split_once('.')
            .and_then(|(ns, name)| self.namespaces.get(ns)?.get(name))
            .ok_or_else(|| Error::argument(format!("no export named '{}'", path)))?;

        match *export {
            Export::Call(handler) => handler(&self.backend, args),
            Export::Get(ty) => {
                expect_arity(path, args, 1)?;
                let name = arg_str(path, args, 0)?;
                let value = channel(&self.backend)?.read(name, ty)?;
                Ok(json!(value))
            }
            Export::Set(ty) => {
                debug_assert!(ty.is_writable());
                expect_arity(path, args, 2)?;
                let name = arg_str(path, args, 0)?;
                let value = match ty {
                    PropertyType::Bool => PropertyValue::Bool(arg_bool(path, args, 1)?),
                    PropertyType::U64 => match args[1].as_u64() {
                        Some(v) => PropertyValue::U64(v),
                        None => PropertyValue::narrowed(ty, arg_i64(path, args, 1)?)?,
                    },
                    _ => PropertyValue::narrowed(ty, arg_i64(path, args, 1)?)?,
                };
                channel(&self.backend)?.write(name, &value)?;
                Ok(Value::Null)
            }
        }
    }
}

fn diagnostic_report(_: &Backend, args: &[Value]) -> Result<Value> {
    expect_arity("standard.diagnostic_report", args, 0)?;
    Ok(Value::String(standard::diagnostic_report()?))
}

fn dump_stats(_: &Backend, args: &[Value]) -> Result<Value> {
    expect_arity("standard.dump_stats", args, 0)?;
    standard::dump_global_stats();
    Ok(Value::Null)
}

fn snapshot_stats(_: &Backend, args: &[Value]) -> Result<Value> {
    expect_arity("standard.snapshot_stats", args, 0)?;
    Ok(json!(standard::snapshot_stats()))
}

fn trim(_: &Backend, args: &[Value]) -> Result<Value> {
    const PATH: &str = "standard.trim";
    expect_arity(PATH, args, 1)?;
    let pad = args[0]
        .as_u64()
        .and_then(|v| usize::try_from(v).ok())
        .ok_or_else(|| {
            Error::argument(format!(
                "{}: argument 0 must be a non-negative integer, got {}",
                PATH, args[0]
            ))
        })?;
    Ok(Value::from(standard::trim(pad)))
}

fn trigger(backend: &Backend, args: &[Value]) -> Result<Value> {
    const PATH: &str = "ctl.trigger";
    expect_arity(PATH, args, 1)?;
    let name = arg_str(PATH, args, 0)?;
    channel(backend)?.trigger(name)?;
    Ok(Value::Null)
}

fn update_snapshot(backend: &Backend, args: &[Value]) -> Result<Value> {
    expect_arity("ctl.update_snapshot", args, 0)?;
    channel(backend)?.update_snapshot()?;
    Ok(Value::Null)
}

fn flush_thread_cache(backend: &Backend, args: &[Value]) -> Result<Value> {
    expect_arity("ctl.flush_thread_cache", args, 0)?;
    channel(backend)?.flush_thread_cache();
    Ok(Value::Null)
}

fn channel(backend: &Backend) -> Result<&ControlChannel> {
    backend
        .control_channel()
        .ok_or_else(|| Error::argument("control channel backend is not active"))
}

fn expect_arity(path: &str, args: &[Value], expected: usize) -> Result<()> {
    if args.len() != expected {
        return Err(Error::argument(format!(
            "{}: wrong number of arguments, expected {}, got {}",
            path,
            expected,
            args.len()
        )));
    }
    Ok(())
}

fn arg_str<'a>(path: &str, args: &'a [Value], idx: usize) -> Result<&'a str> {
    args[idx].as_str().ok_or_else(|| {
        Error::argument(format!(
            "{}: argument {} must be a string, got {}",
            path, idx, args[idx]
        ))
    })
}

fn arg_i64(path: &str, args: &[Value], idx: usize) -> Result<i64> {
    args[idx].as_i64().ok_or_else(|| {
        Error::argument(format!(
            "{}: argument {} must be an integer, got {}",
            path, idx, args[idx]
        ))
    })
}

fn arg_bool(path: &str, args: &[Value], idx: usize) -> Result<bool> {
    args[idx].as_bool().ok_or_else(|| {
        Error::argument(format!(
            "{}: argument {} must be a boolean, got {}",
            path, idx, args[idx]
        ))
    })
}
