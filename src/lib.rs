//! partshop-api
//!
//! Order intake and lifecycle engine for a store selling physical parts
//! (finite stock, fixed price) and services (price sometimes unknown until an
//! administrator quotes it) to registered and guest customers. The crate
//! turns a cart of mixed product/service lines into a persisted order,
//! reconciles inventory, applies coupon discounts, decides whether the order
//! requires a quote, and governs the subsequent quoting and fulfillment state
//! machines.
//!
//! Transport, session handling, and notification delivery are external
//! collaborators; this crate exposes services over a database pool and emits
//! events at the notification trigger points.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod logging;
pub mod services;

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::services::factory::ServiceContainer;

/// Shared application state: the database pool, configuration, the event
/// sender feeding the notification dispatcher, and the wired services.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: ServiceContainer,
}

impl AppState {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        event_sender: events::EventSender,
    ) -> Self {
        let services = ServiceContainer::new(db.clone(), event_sender.clone());
        Self {
            db,
            config,
            event_sender,
            services,
        }
    }
}
