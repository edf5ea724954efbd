use std::io;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use larder_events::{EventBus, Subscription};

/// Handle to control and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    name: &'static str,
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Request graceful shutdown and wait for the worker to stop.
    ///
    /// Messages already queued on the subscription are drained first.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            if j.join().is_err() {
                warn!(worker = self.name, "worker thread panicked");
            }
        }
    }
}

/// Subscription-driven worker loop on a named OS thread.
///
/// Handlers must tolerate redelivery; a handler error is logged and the loop moves on
/// to the next message.
#[derive(Debug)]
pub struct EventWorker;

impl EventWorker {
    /// Subscribe to `bus` on the calling thread, then consume on a new thread.
    ///
    /// Subscribing before the thread starts means nothing published after `spawn`
    /// returns can be missed.
    pub fn spawn<M, B, H, E>(name: &'static str, bus: &B, poll: Duration, handler: H) -> io::Result<WorkerHandle>
    where
        M: Send + 'static,
        B: EventBus<M> + ?Sized,
        H: FnMut(M) -> Result<(), E> + Send + 'static,
        E: core::fmt::Debug + Send + 'static,
    {
        Self::spawn_with(name, bus.subscribe(), poll, handler)
    }

    /// Consume an existing subscription.
    pub fn spawn_with<M, H, E>(
        name: &'static str,
        subscription: Subscription<M>,
        poll: Duration,
        mut handler: H,
    ) -> io::Result<WorkerHandle>
    where
        M: Send + 'static,
        H: FnMut(M) -> Result<(), E> + Send + 'static,
        E: core::fmt::Debug + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || worker_loop(name, subscription, shutdown_rx, poll, &mut handler))?;

        info!(worker = name, poll_ms = poll.as_millis() as u64, "worker started");

        Ok(WorkerHandle {
            name,
            shutdown: shutdown_tx,
            join: Some(join),
        })
    }
}

fn worker_loop<M, H, E>(
    name: &'static str,
    sub: Subscription<M>,
    shutdown_rx: mpsc::Receiver<()>,
    poll: Duration,
    handler: &mut H,
) where
    H: FnMut(M) -> Result<(), E>,
    E: core::fmt::Debug,
{
    loop {
        if shutdown_rx.try_recv().is_ok() {
            while let Ok(msg) = sub.try_recv() {
                run(name, handler, msg);
            }
            break;
        }

        match sub.recv_timeout(poll) {
            Ok(msg) => run(name, handler, msg),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    info!(worker = name, "worker stopped");
}

fn run<M, H, E>(name: &'static str, handler: &mut H, msg: M)
where
    H: FnMut(M) -> Result<(), E>,
    E: core::fmt::Debug,
{
    if let Err(err) = handler(msg) {
        warn!(worker = name, error = ?err, "worker handler failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use larder_events::InMemoryEventBus;

    #[test]
    fn handles_messages_and_drains_on_shutdown() {
        let bus = InMemoryEventBus::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let handle = EventWorker::spawn("test-worker", &bus, Duration::from_millis(10), move |n: u32| {
            sink.lock().unwrap().push(n);
            if n == 2 { Err("two is unlucky") } else { Ok(()) }
        })
        .unwrap();

        for n in 1..=3 {
            bus.publish(n).unwrap();
        }
        handle.shutdown();

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }
}
