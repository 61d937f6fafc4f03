//! Runtime error type and the process-wide error policy.
//!
//! Every condition reported here is a programmer error: a handle used with the
//! wrong device, a refit before a build, a binder overflow. By default such
//! errors are fatal (logged with a backtrace, then the process aborts). The
//! policy can be relaxed to `Panic` or `Return` so callers and tests can observe
//! them as values.

use std::backtrace::Backtrace;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::device::{DeviceId, ResourceTag};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised by the runtime spine and by device implementations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A resource or view created by one device was used with another.
    #[error("resource of device {found} used with device {expected}")]
    DeviceMismatch { expected: DeviceId, found: DeviceId },

    /// A backend returned the invalid sentinel from a successful create.
    #[error("backend returned an invalid handle for a new {0:?}")]
    InvalidHandle(ResourceTag),

    /// Refit/update requested on geometry that was never built.
    #[error("geometry #{handle} ({tag:?}) is not built when updating")]
    NotBuilt { tag: ResourceTag, handle: u64 },

    /// A dispatch command ran out of argument slots.
    #[error("too many arguments for shader #{handle} (limit is {limit})")]
    TooManyArguments { handle: u64, limit: usize },

    /// A call-site argument does not match the kernel's parameter list.
    #[error("argument mismatch: {0}")]
    ArgumentMismatch(String),

    /// Dispatch extents must all be non-zero.
    #[error("invalid dispatch size ({0}, {1}, {2})")]
    InvalidDispatchSize(u32, u32, u32),

    /// A range or index lies outside the addressed object.
    #[error("out of range: {0}")]
    OutOfRange(String),

    /// A constant hash that was never produced by the constant store.
    #[error("unknown constant data #{0:016x}")]
    UnknownConstant(u64),

    /// A structural type description that cannot be parsed.
    #[error("invalid type description `{description}`: {reason}")]
    InvalidTypeDescription { description: String, reason: String },

    /// Failure reported by a backend implementation.
    #[error("backend failure: {0}")]
    Backend(String),
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Backend(format!("{err:#}"))
    }
}

/// What the runtime does when it detects an error.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
#[repr(u8)]
pub enum ErrorPolicy {
    /// Log the message and a backtrace, then abort the process.
    #[default]
    Abort = 0,
    /// Panic with the message.
    Panic = 1,
    /// Return the error to the caller.
    Return = 2,
}

static POLICY: AtomicU8 = AtomicU8::new(ErrorPolicy::Abort as u8);

/// Selects the process-wide error policy.
pub fn set_error_policy(policy: ErrorPolicy) {
    POLICY.store(policy as u8, Ordering::Relaxed);
}

/// Returns the active error policy.
pub fn error_policy() -> ErrorPolicy {
    match POLICY.load(Ordering::Relaxed) {
        1 => ErrorPolicy::Panic,
        2 => ErrorPolicy::Return,
        _ => ErrorPolicy::Abort,
    }
}

/// Routes `error` through the active policy.
///
/// Only returns under [`ErrorPolicy::Return`].
pub fn raise<T>(error: Error) -> Result<T> {
    match error_policy() {
        ErrorPolicy::Return => Err(error),
        ErrorPolicy::Panic => panic!("{error}"),
        ErrorPolicy::Abort => {
            let trace = Backtrace::force_capture();
            log::error!("{error}\n{trace}");
            std::process::abort()
        }
    }
}

/// Passes `Ok` through and routes `Err` through the active policy.
#[inline]
pub fn check<T>(result: Result<T>) -> Result<T> {
    result.or_else(raise)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_errors_keep_the_anyhow_context_chain() {
        let err = anyhow::anyhow!("driver lost").context("failed to create buffer");
        let err = Error::from(err);
        assert_eq!(
            err,
            Error::Backend("failed to create buffer: driver lost".to_string())
        );
    }

    #[test]
    fn return_policy_hands_errors_back() {
        set_error_policy(ErrorPolicy::Return);
        let r: Result<()> = raise(Error::UnknownConstant(7));
        assert_eq!(r, Err(Error::UnknownConstant(7)));
        assert_eq!(check(Ok::<_, Error>(3)), Ok(3));
    }

    #[test]
    fn messages_name_the_offending_object() {
        let err = Error::NotBuilt { tag: ResourceTag::Accel, handle: 4 };
        assert_eq!(err.to_string(), "geometry #4 (Accel) is not built when updating");
    }
}
