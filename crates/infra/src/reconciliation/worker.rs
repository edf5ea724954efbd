use std::io;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value as JsonValue;

use larder_events::{EventBus, EventEnvelope};

use crate::material_store::MaterialStore;
use crate::processed_log::ProcessedEventLog;
use crate::workers::{EventWorker, WorkerHandle};

use super::listener::{STOCK_RECONCILIATION, StockReconciliationListener};

/// Runs a `StockReconciliationListener` against a bus subscription.
#[derive(Debug)]
pub struct ReconciliationWorker;

impl ReconciliationWorker {
    pub fn spawn<M, P, B>(
        listener: Arc<StockReconciliationListener<M, P>>,
        bus: &B,
        poll: Duration,
    ) -> io::Result<WorkerHandle>
    where
        M: MaterialStore + 'static,
        P: ProcessedEventLog + 'static,
        B: EventBus<EventEnvelope<JsonValue>> + ?Sized,
    {
        EventWorker::spawn(STOCK_RECONCILIATION, bus, poll, move |envelope: EventEnvelope<JsonValue>| {
            listener.handle_envelope(&envelope).map(|_| ())
        })
    }
}
