use std::sync::Arc;
use std::task::{Wake, Waker};

/// Generator bodies are resumed by stepping, so nothing ever needs to be woken up.
struct Unused;

impl Wake for Unused {
    fn wake(self: Arc<Self>) {}
}

pub(crate) fn noop() -> Waker {
    Waker::from(Arc::new(Unused))
}
