use parking_lot::Mutex;
use std::sync::OnceLock;
use thiserror::Error;

/// The fixed kind enumeration of the process-wide error slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Ok,
    Device,
    Sound,
    Range,
}

/// The `Result` error type returned by `Mixer`'s control API. Rust callers
/// should prefer matching on this directly; the global last-error slot
/// (`last_error()`) exists in parallel for host bindings that poll a
/// single-slot `get_error()` instead of propagating `Result`.
#[derive(Debug, Error, Clone)]
#[error("{kind:?}: {message}")]
pub struct MixerError {
    pub kind: ErrorKind,
    pub message: String,
}

impl MixerError {
    pub fn range(message: impl Into<String>) -> Self {
        MixerError { kind: ErrorKind::Range, message: message.into() }
    }

    pub fn sound(message: impl Into<String>) -> Self {
        MixerError { kind: ErrorKind::Sound, message: message.into() }
    }

    pub fn device(message: impl Into<String>) -> Self {
        MixerError { kind: ErrorKind::Device, message: message.into() }
    }
}

static LAST_ERROR: OnceLock<Mutex<(ErrorKind, String)>> = OnceLock::new();

fn slot() -> &'static Mutex<(ErrorKind, String)> {
    LAST_ERROR.get_or_init(|| Mutex::new((ErrorKind::Ok, String::new())))
}

/// Clears the slot to `Ok`. Called at the start of every control operation.
pub(crate) fn clear_error() {
    let mut s = slot().lock();
    *s = (ErrorKind::Ok, String::new());
}

pub(crate) fn set_error(err: &MixerError) {
    let mut s = slot().lock();
    *s = (err.kind, err.message.clone());
}

/// Returns `(kind, message)` for the most recently completed control
/// operation. Never blocks.
pub fn last_error() -> (ErrorKind, String) {
    slot().lock().clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_ok() {
        clear_error();
        assert_eq!(last_error().0, ErrorKind::Ok);
    }

    #[test]
    fn set_then_read() {
        set_error(&MixerError::range("channel 9999 out of range"));
        let (kind, msg) = last_error();
        assert_eq!(kind, ErrorKind::Range);
        assert!(msg.contains("9999"));
        clear_error();
        assert_eq!(last_error().0, ErrorKind::Ok);
    }
}
