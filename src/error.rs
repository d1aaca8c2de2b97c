//! Errors reported for coroutines driven by a [`CoroutineController`].
//!
//! [`CoroutineController`]: crate::controller::CoroutineController

use std::any::Any;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoroutineError {
    /// The coroutine body panicked while being stepped
    #[error("coroutine body panicked: {0}")]
    Panicked(String),

    /// The controller was dropped before the coroutine finished
    #[error("coroutine was dropped before finishing")]
    Dropped,
}

impl CoroutineError {
    /// Build a [`CoroutineError::Panicked`] out of a payload caught by `catch_unwind`.
    pub(crate) fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_owned()
        };
        CoroutineError::Panicked(message)
    }
}

pub type Result<T> = std::result::Result<T, CoroutineError>;
