use std::fmt;

/// Errors surfaced by every heapctl operation.
///
/// Nothing is retried and nothing is partially returned: an operation either
/// yields a complete value or one of these.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Wrong arity, wrong type or out-of-range value supplied by the caller.
    /// Raised before any native call is attempted.
    #[error("invalid argument: {0}")]
    Argument(String),

    /// The allocator call returned a failure status.
    #[error("{call} failed: {code}")]
    NativeCall { call: String, code: NativeCode },

    /// The scoped memory sink could not be created.
    #[error("failed to create memory sink: {0}")]
    Resource(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn native(call: impl Into<String>, code: i32) -> Self {
        Error::NativeCall {
            call: call.into(),
            code: NativeCode::from_raw(code),
        }
    }

    pub(crate) fn argument(msg: impl Into<String>) -> Self {
        Error::Argument(msg.into())
    }

    /// Short machine-friendly kind, used by the export surface.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Argument(_) => "ArgumentError",
            Error::NativeCall { .. } => "NativeCallError",
            Error::Resource(_) => "ResourceError",
        }
    }
}

/// A raw allocator status code together with its symbolic errno name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeCode {
    pub code: i32,
    pub name: String,
}

impl NativeCode {
    pub fn from_raw(code: i32) -> Self {
        let name = match errno_name(code) {
            Some(name) => name.to_string(),
            None => format!("E{}", code),
        };
        Self { code, name }
    }

    /// OS description of the code, e.g. "No such file or directory".
    pub fn description(&self) -> String {
        let rendered = std::io::Error::from_raw_os_error(self.code).to_string();
        // io::Error renders as "<description> (os error N)"
        match rendered.rfind(" (os error") {
            Some(idx) => rendered[..idx].to_string(),
            None => rendered,
        }
    }
}

impl fmt::Display for NativeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.description())
    }
}

/// Symbolic names for the codes mallctl and friends actually return.
pub fn errno_name(code: i32) -> Option<&'static str> {
    let name = match code {
        libc::EPERM => "EPERM",
        libc::ENOENT => "ENOENT",
        libc::EIO => "EIO",
        libc::EAGAIN => "EAGAIN",
        libc::ENOMEM => "ENOMEM",
        libc::EFAULT => "EFAULT",
        libc::EBUSY => "EBUSY",
        libc::EEXIST => "EEXIST",
        libc::EINVAL => "EINVAL",
        libc::EFBIG => "EFBIG",
        libc::ENOSPC => "ENOSPC",
        libc::ERANGE => "ERANGE",
        libc::ENOSYS => "ENOSYS",
        libc::ENOTSUP => "ENOTSUP",
        _ => return None,
    };
    Some(name)
}
