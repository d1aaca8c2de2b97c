//! Cooperative coroutines stepped once per frame.
//!
//! A coroutine body is any lazy sequence: an [`Iterator`], or an `async` block turned into one
//! with [`generator`](generator::generator). A [`CoroutineContext`](context::CoroutineContext)
//! advances one body by one element per step, and a
//! [`CoroutineController`](controller::CoroutineController) steps all of its coroutines on every
//! [`update`](controller::CoroutineController::update), dropping the finished ones. Bodies
//! suspend themselves across frames with [`ExecutionBlockRequest`](block::ExecutionBlockRequest)s.

pub mod block;
pub mod context;
pub mod controller;
pub mod error;
pub mod generator;
pub mod observer;
pub mod plugin;
mod waker;

pub mod prelude {
    #[doc(hidden)]
    pub use crate::block::{
        wait_on, ExecutionBlockRequest, TimeBlockRequest, UpdateCountBlockRequest,
    };

    #[doc(hidden)]
    pub use crate::context::{CoroutineContext, Step};

    #[doc(hidden)]
    pub use crate::controller::{CoroHandle, CoroutineController, FaultPolicy};

    #[doc(hidden)]
    pub use crate::error::CoroutineError;

    #[doc(hidden)]
    pub use crate::generator::{generator, Yielder};

    #[doc(hidden)]
    pub use crate::plugin::CoroutinePlugin;
}

#[cfg(test)]
mod test {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::prelude::*;

    #[test]
    fn wait_on_frames() {
        let controller: CoroutineController = CoroutineController::new();
        let a = Arc::new(Mutex::new(0));
        let b = Arc::clone(&a);

        controller.add_with(move || {
            let b = Arc::clone(&b);
            generator(|mut y: Yielder<()>| async move {
                *b.lock().unwrap() += 1;
                y.yield_(()).await;
                *b.lock().unwrap() += 1;
                y.wait_on(UpdateCountBlockRequest::new(1)).await;
                *b.lock().unwrap() += 1;
            })
        });

        controller.update();
        assert_eq!(*a.lock().unwrap(), 1);
        controller.update();
        assert_eq!(*a.lock().unwrap(), 2);
        controller.update();
        assert_eq!(*a.lock().unwrap(), 3);
        assert!(controller.is_empty());
        controller.update();
        assert_eq!(*a.lock().unwrap(), 3);
    }

    #[test]
    fn iterator_body_with_time_block() {
        let controller: CoroutineController = CoroutineController::new();
        let mut handle = controller.spawn_with(|| {
            std::iter::once(())
                .chain(wait_on(TimeBlockRequest::new(Duration::from_millis(30))))
                .chain(std::iter::once(()))
        });

        controller.update();
        controller.update();
        assert!(!handle.is_finished());

        std::thread::sleep(Duration::from_millis(40));
        // Unblocked: the last element is yielded, then the end is discovered.
        controller.update();
        assert!(!handle.is_finished());
        controller.update();
        assert_eq!(handle.try_result(), Some(&Ok(())));
    }

    #[test]
    fn disabling_suspends_a_body() {
        let mut ctx = CoroutineContext::from_factory(|| {
            generator(|mut y: Yielder<u8>| async move {
                for i in 0..3 {
                    y.yield_(i).await;
                }
            })
        });
        ctx.reset();

        assert_eq!(ctx.advance(), Step::Yielded(&0));
        ctx.set_enabled(false);
        assert_eq!(ctx.advance(), Step::Idle);
        ctx.set_enabled(true);
        assert_eq!(ctx.advance(), Step::Yielded(&1));
        assert_eq!(ctx.advance(), Step::Yielded(&2));
        assert_eq!(ctx.advance(), Step::Finished);
    }
}
