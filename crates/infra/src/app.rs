//! In-process wiring: one event store, one bus, the services that write to them and
//! the background consumers that react to what they publish.

use std::io;
use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::info;

use larder_events::{EventEnvelope, InMemoryEventBus};
use larder_purchasing::SupplierCatalog;
use larder_sales::{OptionCatalog, OrderId, ProductCatalog};

use crate::command_dispatcher::CommandDispatcher;
use crate::config::AppConfig;
use crate::event_store::InMemoryEventStore;
use crate::invoicing::{INVOICE_TRIGGER, InvoiceIssuer, InvoiceTrigger};
use crate::material_store::{InMemoryMaterialStore, MaterialStore};
use crate::processed_log::InMemoryProcessedLog;
use crate::projections::{OrderSheet, OrderSheetProjection};
use crate::read_model::InMemoryReadStore;
use crate::reconciliation::{ReconciliationMetrics, ReconciliationWorker, StockReconciliationListener};
use crate::services::{DailySequence, InventoryCheckService, OrderService, PurchaseService};
use crate::workers::{EventWorker, WorkerHandle};

pub type Bus = InMemoryEventBus<EventEnvelope<JsonValue>>;
pub type Dispatcher = CommandDispatcher<Arc<InMemoryEventStore>, Arc<Bus>>;
pub type Reconciliation = StockReconciliationListener<Arc<InMemoryMaterialStore>, Arc<InMemoryProcessedLog>>;
pub type OrderSheets = OrderSheetProjection<Arc<InMemoryReadStore<OrderId, OrderSheet>>>;

/// Master data and outbound integrations owned by other systems.
pub struct Collaborators {
    pub products: Arc<dyn ProductCatalog>,
    pub options: Arc<dyn OptionCatalog>,
    pub suppliers: Arc<dyn SupplierCatalog>,
    pub invoices: Arc<dyn InvoiceIssuer>,
}

pub struct LarderApp {
    pub dispatcher: Arc<Dispatcher>,
    pub materials: Arc<InMemoryMaterialStore>,
    pub processed: Arc<InMemoryProcessedLog>,
    pub reconciliation: Arc<Reconciliation>,
    pub order_sheets: Arc<OrderSheets>,
    pub orders: OrderService<Arc<InMemoryEventStore>, Arc<Bus>>,
    pub purchases: PurchaseService<Arc<InMemoryEventStore>, Arc<Bus>>,
    pub inventory_checks: InventoryCheckService<Arc<InMemoryEventStore>, Arc<Bus>>,
    workers: Vec<WorkerHandle>,
}

impl LarderApp {
    /// Build everything and start the consumers. Consumers subscribe before this
    /// returns, so no event published afterwards is missed.
    pub fn start(config: &AppConfig, collaborators: Collaborators) -> io::Result<Self> {
        let bus: Arc<Bus> = Arc::new(InMemoryEventBus::new());
        let dispatcher = Arc::new(CommandDispatcher::new(Arc::new(InMemoryEventStore::new()), Arc::clone(&bus)));
        let materials = Arc::new(InMemoryMaterialStore::new());
        let processed = Arc::new(InMemoryProcessedLog::new());
        let numbers = Arc::new(DailySequence::new());
        let material_lookup: Arc<dyn MaterialStore> = materials.clone();

        let reconciliation = Arc::new(StockReconciliationListener::new(
            Arc::clone(&materials),
            Arc::clone(&processed),
            Arc::new(ReconciliationMetrics::new()),
        ));
        let invoice_trigger = InvoiceTrigger::new(Arc::clone(&collaborators.invoices), Arc::clone(&processed));
        let order_sheets: Arc<OrderSheets> = Arc::new(OrderSheetProjection::new(Arc::new(InMemoryReadStore::new())));

        let mut workers = Vec::with_capacity(3);
        workers.push(ReconciliationWorker::spawn(
            Arc::clone(&reconciliation),
            bus.as_ref(),
            config.worker_poll,
        )?);
        workers.push(EventWorker::spawn(
            INVOICE_TRIGGER,
            bus.as_ref(),
            config.worker_poll,
            move |envelope: EventEnvelope<JsonValue>| invoice_trigger.handle_envelope(&envelope).map(|_| ()),
        )?);
        let sheets = Arc::clone(&order_sheets);
        workers.push(EventWorker::spawn(
            "order-sheet",
            bus.as_ref(),
            config.worker_poll,
            move |envelope: EventEnvelope<JsonValue>| sheets.apply_envelope(&envelope),
        )?);

        let app = Self {
            orders: OrderService::new(
                Arc::clone(&dispatcher),
                collaborators.products,
                collaborators.options,
                Arc::clone(&numbers),
                config.order_prefix.clone(),
            ),
            purchases: PurchaseService::new(
                Arc::clone(&dispatcher),
                collaborators.suppliers,
                Arc::clone(&material_lookup),
                Arc::clone(&numbers),
                config.purchase_prefix.clone(),
            ),
            inventory_checks: InventoryCheckService::new(
                Arc::clone(&dispatcher),
                material_lookup,
                numbers,
                config.check_prefix.clone(),
            ),
            dispatcher,
            materials,
            processed,
            reconciliation,
            order_sheets,
            workers,
        };
        info!(workers = app.workers.len(), "larder started");
        Ok(app)
    }

    /// Stop every consumer after it drained what was already delivered to it.
    /// Stores and projections stay readable afterwards.
    pub fn shutdown(&mut self) {
        for worker in std::mem::take(&mut self.workers) {
            let name = worker.name();
            worker.shutdown();
            info!(worker = name, "worker joined");
        }
    }
}
