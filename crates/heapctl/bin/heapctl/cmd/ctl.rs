use clap::{Args, Subcommand};
use eyre::{eyre, Result};
use heapctl::ctl::PropertyType;
use heapctl::exports::CTL_NS;
use heapctl::Exports;
use serde_json::{json, Map, Value};

#[derive(Args, Debug)]
pub struct CtlArgs {
    #[command(subcommand)]
    pub cmd: CtlSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum CtlSubcommand {
    #[command(about = "Read a property, e.g. `ctl get stats.allocated --type size`")]
    Get {
        name: String,
        #[arg(long = "type", short, default_value_t = PropertyType::Size)]
        ty: PropertyType,
    },
    #[command(about = "Write a property, e.g. `ctl set background_thread true --type bool`")]
    Set {
        name: String,
        value: String,
        #[arg(long = "type", short, default_value_t = PropertyType::Size)]
        ty: PropertyType,
    },
    #[command(about = "Invoke a no-value property, e.g. `ctl trigger arena.0.purge`")]
    Trigger { name: String },
    #[command(about = "Advance the epoch so cached statistics are refreshed")]
    Epoch,
    #[command(about = "Flush the calling thread's cache")]
    Flush,
}

impl CtlArgs {
    pub fn title(&self) -> &'static str {
        match self.cmd {
            CtlSubcommand::Get { .. } => "mallctl read",
            CtlSubcommand::Set { .. } => "mallctl write",
            CtlSubcommand::Trigger { .. } => "mallctl trigger",
            CtlSubcommand::Epoch => "epoch",
            CtlSubcommand::Flush => "thread.tcache.flush",
        }
    }

    pub fn run(&self, exports: &Exports) -> Result<Value> {
        if !exports.has_namespace(CTL_NS) {
            return Err(eyre!(
                "the control channel is not available (active backend: {})",
                exports.backend()
            ));
        }

        let value = match &self.cmd {
            CtlSubcommand::Get { name, ty } => {
                let path = getter(*ty)?;
                let value = exports.call(path, &[json!(name)])?;
                keyed(name, value)
            }
            CtlSubcommand::Set { name, value, ty } => {
                let path = setter(*ty)?;
                let host_value = parse_value(value, *ty)?;
                exports.call(path, &[json!(name), host_value.clone()])?;
                keyed(name, host_value)
            }
            CtlSubcommand::Trigger { name } => exports.call("ctl.trigger", &[json!(name)])?,
            CtlSubcommand::Epoch => exports.call("ctl.update_snapshot", &[])?,
            CtlSubcommand::Flush => exports.call("ctl.flush_thread_cache", &[])?,
        };
        Ok(value)
    }
}

fn getter(ty: PropertyType) -> Result<&'static str> {
    let path = match ty {
        PropertyType::Size => "ctl.get_size",
        PropertyType::SSize => "ctl.get_ssize",
        PropertyType::U32 => "ctl.get_u32",
        PropertyType::U64 => "ctl.get_u64",
        PropertyType::Str => "ctl.get_string",
        PropertyType::Bool => "ctl.get_bool",
        PropertyType::Unsigned => "ctl.get_unsigned",
        PropertyType::Void => return Err(eyre!("use `ctl trigger` for void properties")),
    };
    Ok(path)
}

fn setter(ty: PropertyType) -> Result<&'static str> {
    let path = match ty {
        PropertyType::Size => "ctl.set_size",
        PropertyType::SSize => "ctl.set_ssize",
        PropertyType::U32 => "ctl.set_u32",
        PropertyType::U64 => "ctl.set_u64",
        PropertyType::Bool => "ctl.set_bool",
        other => return Err(eyre!("properties of type {} are read-only", other)),
    };
    Ok(path)
}

fn parse_value(raw: &str, ty: PropertyType) -> Result<Value> {
    let value = match ty {
        PropertyType::Bool => {
            let flag = raw
                .parse::<bool>()
                .map_err(|_| eyre!("expected true or false, got '{}'", raw))?;
            Value::Bool(flag)
        }
        PropertyType::U64 => match raw.parse::<u64>() {
            Ok(v) => json!(v),
            Err(_) => json!(parse_i64(raw)?),
        },
        _ => json!(parse_i64(raw)?),
    };
    Ok(value)
}

fn keyed(name: &str, value: Value) -> Value {
    let mut obj = Map::new();
    obj.insert(name.to_string(), value);
    Value::Object(obj)
}

fn parse_i64(raw: &str) -> Result<i64> {
    raw.parse::<i64>()
        .map_err(|_| eyre!("expected an integer, got '{}'", raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("true", PropertyType::Bool).unwrap(), json!(true));
        assert_eq!(parse_value("-1", PropertyType::SSize).unwrap(), json!(-1));
        assert_eq!(
            parse_value("18446744073709551615", PropertyType::U64).unwrap(),
            json!(u64::MAX)
        );
        assert!(parse_value("yes", PropertyType::Bool).is_err());
        assert!(parse_value("1.5", PropertyType::U32).is_err());
    }

    #[test]
    fn test_read_only_types_have_no_setter() {
        assert!(setter(PropertyType::Str).is_err());
        assert!(setter(PropertyType::Unsigned).is_err());
        assert!(getter(PropertyType::Void).is_err());
    }
}
