//! Infrastructure layer: event store, dispatcher, stores, consumers and wiring.

pub mod app;
pub mod command_dispatcher;
pub mod config;
pub mod event_store;
pub mod invoicing;
pub mod material_store;
pub mod processed_log;
pub mod projections;
pub mod read_model;
pub mod reconciliation;
pub mod services;
pub mod workers;

#[cfg(test)]
mod integration_tests;
