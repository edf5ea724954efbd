//! Publish/subscribe abstraction for committed domain events.
//!
//! Producers publish strictly after their aggregate's append has committed, so a
//! subscriber never observes an event for a confirmation that was rolled back.
//!
//! Delivery is at-least-once from a consumer's point of view: a producer may crash
//! between commit and publish and an upstream retry may publish again. Consumers that
//! mutate shared state (stock reconciliation, invoice requests) therefore guard on a
//! durable processed-event key instead of trusting the transport.
//!
//! Ordering is only assumed per aggregate stream (FIFO per publisher thread); nothing
//! orders events of different aggregates or event types.

use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
use std::time::Duration;

/// Receiving end of one subscriber. Each subscription gets its own copy of every
/// message published after it was created.
///
/// ```ignore
/// let subscription = bus.subscribe();
/// loop {
///     match subscription.recv_timeout(Duration::from_millis(250)) {
///         Ok(envelope) => handle(envelope),
///         Err(RecvTimeoutError::Timeout) => continue, // check for shutdown
///         Err(RecvTimeoutError::Disconnected) => break,
///     }
/// }
/// ```
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, RecvError> {
        self.receiver.recv()
    }

    pub fn try_recv(&self) -> Result<M, TryRecvError> {
        self.receiver.try_recv()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// In-process event bus with explicit subscriber registration.
///
/// Subscribers are wired by calling `subscribe()` during startup and handing the
/// subscription to a worker; nothing is discovered implicitly.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
