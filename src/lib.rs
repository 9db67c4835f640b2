//! Retail Ledger
//!
//! Multi-branch point-of-sale engine: FEFO lot allocation, sale settlement,
//! expiration risk and demand forecasting over a SeaORM database.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod migrator;
pub mod ml;
pub mod services;

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use crate::{
    auth::{Authorizer, RoleAuthorizer},
    config::AppConfig,
    db::DbPool,
    errors::ServiceError,
    events::{Event, EventSender},
    services::factory::{ServiceContainer, ServiceFactory},
};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: AppConfig,
    pub event_sender: EventSender,
    pub services: ServiceContainer,
    pub authorizer: Arc<dyn Authorizer>,
}

impl AppState {
    /// Wires services over an existing pool. The receiver end of the event
    /// channel is returned for the caller to drain.
    pub fn new(db: Arc<DbPool>, config: AppConfig) -> (Self, mpsc::Receiver<Event>) {
        let (event_sender, rx) = EventSender::channel(config.event_channel_capacity);
        let factory = ServiceFactory::new(db.clone(), event_sender.clone(), config.clone());
        let services = ServiceContainer::new(&factory);
        let state = Self {
            db,
            config,
            event_sender,
            services,
            authorizer: Arc::new(RoleAuthorizer::new()),
        };
        (state, rx)
    }

    /// Connects to the configured database, migrating it first when
    /// `auto_migrate` is set.
    pub async fn connect(config: AppConfig) -> Result<(Self, mpsc::Receiver<Event>), ServiceError> {
        let pool = db::establish_connection_from_app_config(&config).await?;
        if config.auto_migrate {
            db::run_migrations(&pool).await?;
            info!("Database migrations applied");
        }
        Ok(Self::new(Arc::new(pool), config))
    }

    pub fn with_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = authorizer;
        self
    }
}
