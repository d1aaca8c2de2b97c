//! Coroutine bodies written as `async` blocks.
//!
//! A body receives a [`Yielder`] and awaits [`Yielder::yield_`] every time it wants to hand a
//! value back to whoever steps it. The resulting [`Generator`] is a plain [`Iterator`], so it
//! can be driven by a [`CoroutineContext`](crate::context::CoroutineContext) like any other
//! sequence:
//!
//! ```
//! use coframe::prelude::*;
//!
//! let mut ctx = CoroutineContext::from_factory(|| {
//!     generator(|mut y: Yielder<&'static str>| async move {
//!         y.yield_("spawn").await;
//!         y.yield_("explode").await;
//!     })
//! });
//! ctx.reset();
//! assert_eq!(ctx.step_out(), (false, Some(&"spawn")));
//! assert_eq!(ctx.step_out(), (false, Some(&"explode")));
//! assert_eq!(ctx.step_out(), (true, None));
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use parking_lot::Mutex;
use pin_project::pin_project;

use crate::block::ExecutionBlockRequest;
use crate::waker;

const ERR_FOREIGN_AWAIT: &str = "A coroutine body suspended without yielding a value.
That is most likely because it awaits a future which
is not part of this library.";

type Slot<Y> = Arc<Mutex<Option<Y>>>;

/// Turn an `async` body into a lazy sequence. The body does not run until the first call to
/// [`next`](Iterator::next), and every call runs it up to its next yield.
pub fn generator<Y, F, Fut>(body: F) -> Generator<Y>
where
    Y: Send + 'static,
    F: FnOnce(Yielder<Y>) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let slot: Slot<Y> = Arc::new(Mutex::new(None));
    let future = body(Yielder {
        slot: Arc::clone(&slot),
    });
    Generator {
        body: Box::pin(Body {
            future,
            slot,
            waker: waker::noop(),
            done: false,
        }),
    }
}

/// See [`generator`].
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct Generator<Y> {
    body: Pin<Box<dyn Resume<Y> + Send>>,
}

impl<Y> Iterator for Generator<Y> {
    type Item = Y;

    fn next(&mut self) -> Option<Y> {
        self.body.as_mut().resume()
    }
}

trait Resume<Y> {
    fn resume(self: Pin<&mut Self>) -> Option<Y>;
}

#[pin_project]
struct Body<Y, Fut> {
    #[pin]
    future: Fut,
    slot: Slot<Y>,
    waker: Waker,
    done: bool,
}

impl<Y, Fut> Resume<Y> for Body<Y, Fut>
where
    Fut: Future<Output = ()>,
{
    fn resume(self: Pin<&mut Self>) -> Option<Y> {
        let this = self.project();
        if *this.done {
            return None;
        }

        let mut cx = Context::from_waker(this.waker);

        // Stays set if the body panics, a body which panicked is exhausted.
        *this.done = true;
        match this.future.poll(&mut cx) {
            Poll::Ready(()) => None,
            Poll::Pending => {
                let value = this.slot.lock().take().expect(ERR_FOREIGN_AWAIT);
                *this.done = false;
                Some(value)
            }
        }
    }
}

/// Handed to a generator body, used to suspend it.
pub struct Yielder<Y> {
    slot: Slot<Y>,
}

impl<Y> Yielder<Y> {
    /// Suspend the body, handing `value` to the caller of the current step.
    pub fn yield_(&mut self, value: Y) -> YieldNow<'_, Y> {
        YieldNow {
            slot: &self.slot,
            value: Some(value),
        }
    }

    /// Suspend the body until `request` unblocks, yielding `Y::default()` on every step it
    /// spends blocked. Resolves without yielding if the request is already unblocked.
    pub fn wait_on<R>(&mut self, request: R) -> BlockedOn<'_, Y, R>
    where
        R: ExecutionBlockRequest,
        Y: Default,
    {
        BlockedOn {
            slot: &self.slot,
            request,
        }
    }
}

#[pin_project]
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct YieldNow<'a, Y> {
    slot: &'a Slot<Y>,
    value: Option<Y>,
}

impl<Y> Future for YieldNow<'_, Y> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        let this = self.project();
        match this.value.take() {
            Some(value) => {
                *this.slot.lock() = Some(value);
                Poll::Pending
            }
            // Polled again, so the step that consumed the value is over.
            None => Poll::Ready(()),
        }
    }
}

#[pin_project]
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct BlockedOn<'a, Y, R> {
    slot: &'a Slot<Y>,
    request: R,
}

impl<Y, R> Future for BlockedOn<'_, Y, R>
where
    Y: Default,
    R: ExecutionBlockRequest,
{
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        let this = self.project();
        if this.request.can_execute() {
            Poll::Ready(())
        } else {
            *this.slot.lock() = Some(Y::default());
            Poll::Pending
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::block::UpdateCountBlockRequest;

    #[test]
    fn yields_in_order() {
        let values: Vec<u32> = generator(|mut y: Yielder<u32>| async move {
            for i in 0..3 {
                y.yield_(i * 10).await;
            }
        })
        .collect();
        assert_eq!(values, vec![0, 10, 20]);
    }

    #[test]
    fn body_does_not_run_ahead() {
        let progress = Arc::new(AtomicUsize::new(0));
        let p = Arc::clone(&progress);
        let mut gen = generator(|mut y: Yielder<()>| async move {
            p.fetch_add(1, Ordering::SeqCst);
            y.yield_(()).await;
            p.fetch_add(1, Ordering::SeqCst);
            y.yield_(()).await;
            p.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(progress.load(Ordering::SeqCst), 0);
        assert_eq!(gen.next(), Some(()));
        assert_eq!(progress.load(Ordering::SeqCst), 1);
        assert_eq!(gen.next(), Some(()));
        assert_eq!(progress.load(Ordering::SeqCst), 2);
        assert_eq!(gen.next(), None);
        assert_eq!(progress.load(Ordering::SeqCst), 3);
        assert_eq!(gen.next(), None);
    }

    #[test]
    fn wait_on_yields_default_while_blocked() {
        let values: Vec<u32> = generator(|mut y: Yielder<u32>| async move {
            y.yield_(1).await;
            y.wait_on(UpdateCountBlockRequest::new(2)).await;
            y.yield_(2).await;
            y.wait_on(UpdateCountBlockRequest::new(0)).await;
        })
        .collect();
        assert_eq!(values, vec![1, 0, 0, 2]);
    }

    #[test]
    fn panicked_body_is_exhausted() {
        let mut gen = generator(|mut y: Yielder<u8>| async move {
            y.yield_(1).await;
            panic!("bad frame");
        });

        assert_eq!(gen.next(), Some(1));
        let caught = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| gen.next()));
        assert!(caught.is_err());
        assert_eq!(gen.next(), None);
        assert_eq!(gen.next(), None);
    }

    #[test]
    #[should_panic(expected = "suspended without yielding")]
    fn awaiting_foreign_future_panics() {
        let mut gen = generator(|_: Yielder<()>| async move {
            std::future::pending::<()>().await;
        });
        gen.next();
    }
}
