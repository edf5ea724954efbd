//! Background consumers of the in-process bus.

pub mod event_worker;

pub use event_worker::{EventWorker, WorkerHandle};
