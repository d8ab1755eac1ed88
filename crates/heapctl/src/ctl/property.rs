//! Property type tags and their native encodings.

use crate::error::{Error, Result};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Native type of a mallctl property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyType {
    /// `size_t`
    Size,
    /// `ssize_t`
    SSize,
    /// `uint32_t`
    U32,
    /// `uint64_t`
    U64,
    /// `const char *`, read-only
    Str,
    /// `bool`
    Bool,
    /// `unsigned`, read-only
    Unsigned,
    /// No value at all. Used for side-effect properties such as `thread.tcache.flush`.
    Void,
}

impl PropertyType {
    pub const ALL: [PropertyType; 8] = [
        PropertyType::Size,
        PropertyType::SSize,
        PropertyType::U32,
        PropertyType::U64,
        PropertyType::Str,
        PropertyType::Bool,
        PropertyType::Unsigned,
        PropertyType::Void,
    ];

    /// Width of the native value in bytes.
    pub fn width(self) -> usize {
        match self {
            PropertyType::Size => std::mem::size_of::<libc::size_t>(),
            PropertyType::SSize => std::mem::size_of::<libc::ssize_t>(),
            PropertyType::U32 => std::mem::size_of::<u32>(),
            PropertyType::U64 => std::mem::size_of::<u64>(),
            PropertyType::Str => std::mem::size_of::<*const libc::c_char>(),
            PropertyType::Bool => std::mem::size_of::<bool>(),
            PropertyType::Unsigned => std::mem::size_of::<libc::c_uint>(),
            PropertyType::Void => 0,
        }
    }

    pub fn is_writable(self) -> bool {
        !matches!(
            self,
            PropertyType::Str | PropertyType::Unsigned | PropertyType::Void
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PropertyType::Size => "size",
            PropertyType::SSize => "ssize",
            PropertyType::U32 => "u32",
            PropertyType::U64 => "u64",
            PropertyType::Str => "string",
            PropertyType::Bool => "bool",
            PropertyType::Unsigned => "unsigned",
            PropertyType::Void => "void",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PropertyType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        PropertyType::ALL
            .into_iter()
            .find(|ty| ty.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "unknown property type '{}', expected one of: size, ssize, u32, u64, string, bool, unsigned, void",
                    s
                )
            })
    }
}

/// A decoded property value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Size(usize),
    SSize(isize),
    U32(u32),
    U64(u64),
    Str(String),
    Bool(bool),
    Unsigned(u32),
    Void,
}

impl PropertyValue {
    pub fn property_type(&self) -> PropertyType {
        match self {
            PropertyValue::Size(_) => PropertyType::Size,
            PropertyValue::SSize(_) => PropertyType::SSize,
            PropertyValue::U32(_) => PropertyType::U32,
            PropertyValue::U64(_) => PropertyType::U64,
            PropertyValue::Str(_) => PropertyType::Str,
            PropertyValue::Bool(_) => PropertyType::Bool,
            PropertyValue::Unsigned(_) => PropertyType::Unsigned,
            PropertyValue::Void => PropertyType::Void,
        }
    }

    /// Narrows a 64-bit signed source to `ty`'s native width with a plain cast.
    pub fn narrowed(ty: PropertyType, source: i64) -> Result<Self> {
        let value = match ty {
            PropertyType::Size => PropertyValue::Size(source as usize),
            PropertyType::SSize => PropertyValue::SSize(source as isize),
            PropertyType::U32 => PropertyValue::U32(source as u32),
            PropertyType::U64 => PropertyValue::U64(source as u64),
            PropertyType::Bool => PropertyValue::Bool(source != 0),
            other => {
                return Err(Error::argument(format!(
                    "properties of type {} cannot be written from a number",
                    other
                )))
            }
        };
        Ok(value)
    }

}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Size(v) => write!(f, "{}", v),
            PropertyValue::SSize(v) => write!(f, "{}", v),
            PropertyValue::U32(v) | PropertyValue::Unsigned(v) => write!(f, "{}", v),
            PropertyValue::U64(v) => write!(f, "{}", v),
            PropertyValue::Str(v) => write!(f, "{}", v),
            PropertyValue::Bool(v) => write!(f, "{}", v),
            PropertyValue::Void => write!(f, "(none)"),
        }
    }
}

impl Serialize for PropertyValue {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            PropertyValue::Size(v) => serializer.serialize_u64(*v as u64),
            PropertyValue::SSize(v) => serializer.serialize_i64(*v as i64),
            PropertyValue::U32(v) | PropertyValue::Unsigned(v) => serializer.serialize_u32(*v),
            PropertyValue::U64(v) => serializer.serialize_u64(*v),
            PropertyValue::Str(v) => serializer.serialize_str(v),
            PropertyValue::Bool(v) => serializer.serialize_bool(*v),
            PropertyValue::Void => serializer.serialize_none(),
        }
    }
}

/// Scratch space large enough and aligned for every [`PropertyType`].
#[repr(C, align(8))]
pub(crate) struct Slot {
    bytes: [u8; 8],
}

impl Slot {
    pub(crate) fn zeroed() -> Self {
        Self { bytes: [0; 8] }
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut libc::c_void {
        self.bytes.as_mut_ptr().cast()
    }

    /// Encodes a writable value, returning the native width used.
    pub(crate) fn encode(&mut self, value: &PropertyValue) -> Result<usize> {
        let ty = value.property_type();
        if !ty.is_writable() {
            return Err(Error::argument(format!("properties of type {} are read-only", ty)));
        }
        match *value {
            PropertyValue::Size(v) => self.put(&v.to_ne_bytes()),
            PropertyValue::SSize(v) => self.put(&v.to_ne_bytes()),
            PropertyValue::U32(v) => self.put(&v.to_ne_bytes()),
            PropertyValue::U64(v) => self.put(&v.to_ne_bytes()),
            PropertyValue::Bool(v) => self.put(&[v as u8]),
            PropertyValue::Str(_) | PropertyValue::Unsigned(_) | PropertyValue::Void => {
                unreachable!("{} is not writable", ty)
            }
        }
        Ok(ty.width())
    }

    /// Decodes the slot as `ty`. `Str` dereferences the stored pointer and copies the string.
    ///
    /// # Safety
    ///
    /// For `Str` the slot must hold a null or valid NUL-terminated C string pointer.
    pub(crate) unsafe fn decode(&self, ty: PropertyType) -> PropertyValue {
        match ty {
            PropertyType::Size => PropertyValue::Size(usize::from_ne_bytes(self.take())),
            PropertyType::SSize => PropertyValue::SSize(isize::from_ne_bytes(self.take())),
            PropertyType::U32 => PropertyValue::U32(u32::from_ne_bytes(self.take())),
            PropertyType::U64 => PropertyValue::U64(u64::from_ne_bytes(self.take())),
            PropertyType::Unsigned => PropertyValue::Unsigned(u32::from_ne_bytes(self.take())),
            PropertyType::Bool => PropertyValue::Bool(self.bytes[0] != 0),
            PropertyType::Str => {
                let ptr = usize::from_ne_bytes(self.take()) as *const libc::c_char;
                if ptr.is_null() {
                    PropertyValue::Str(String::new())
                } else {
                    let s = unsafe { std::ffi::CStr::from_ptr(ptr) };
                    PropertyValue::Str(s.to_string_lossy().into_owned())
                }
            }
            PropertyType::Void => PropertyValue::Void,
        }
    }

    fn put(&mut self, src: &[u8]) {
        self.bytes[..src.len()].copy_from_slice(src);
    }

    fn take<const N: usize>(&self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[..N]);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_property_types() {
        for ty in PropertyType::ALL {
            assert_eq!(ty.as_str().parse::<PropertyType>(), Ok(ty));
        }
        assert!("float".parse::<PropertyType>().is_err());
    }

    #[test]
    fn test_narrowing_truncates() {
        assert_eq!(
            PropertyValue::narrowed(PropertyType::U32, (1i64 << 32) + 5).unwrap(),
            PropertyValue::U32(5)
        );
        assert_eq!(
            PropertyValue::narrowed(PropertyType::SSize, -3).unwrap(),
            PropertyValue::SSize(-3)
        );
        assert!(matches!(
            PropertyValue::narrowed(PropertyType::Str, 1),
            Err(Error::Argument(_))
        ));
    }

    #[test]
    fn test_slot_encode_decode() {
        let mut slot = Slot::zeroed();
        let width = slot.encode(&PropertyValue::U32(0xdead_beef)).unwrap();
        assert_eq!(width, 4);
        assert_eq!(
            unsafe { slot.decode(PropertyType::U32) },
            PropertyValue::U32(0xdead_beef)
        );

        let mut slot = Slot::zeroed();
        slot.encode(&PropertyValue::Bool(true)).unwrap();
        assert_eq!(
            unsafe { slot.decode(PropertyType::Bool) },
            PropertyValue::Bool(true)
        );
    }

    #[test]
    fn test_writable_types() {
        let writable: Vec<PropertyType> = PropertyType::ALL
            .into_iter()
            .filter(|ty| ty.is_writable())
            .collect();
        assert_eq!(
            writable,
            vec![
                PropertyType::Size,
                PropertyType::SSize,
                PropertyType::U32,
                PropertyType::U64,
                PropertyType::Bool
            ]
        );
    }

    #[test]
    fn test_values_serialize_as_host_values() {
        use serde_json::json;

        assert_eq!(json!(PropertyValue::SSize(-1)), json!(-1));
        assert_eq!(json!(PropertyValue::Size(4096)), json!(4096));
        assert_eq!(json!(PropertyValue::U64(u64::MAX)), json!(u64::MAX));
        assert_eq!(json!(PropertyValue::Unsigned(4)), json!(4));
        assert_eq!(json!(PropertyValue::Str("5.3.0".into())), json!("5.3.0"));
        assert_eq!(json!(PropertyValue::Bool(true)), json!(true));
        assert_eq!(json!(PropertyValue::Void), serde_json::Value::Null);
    }

    #[test]
    fn test_read_only_types_rejected() {
        let mut slot = Slot::zeroed();
        assert!(slot.encode(&PropertyValue::Str("x".into())).is_err());
        assert!(slot.encode(&PropertyValue::Unsigned(1)).is_err());
        assert!(slot.encode(&PropertyValue::Void).is_err());
    }
}
