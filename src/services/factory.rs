use std::sync::Arc;

use crate::{
    config::AppConfig,
    db::DbPool,
    events::EventSender,
    services::{
        accounts::AccountService, allocation::AllocationService, forecasting::ForecastPipeline,
        ingestion::IngestionService, reports::ReportService, risk::RiskService,
        settlement::SettlementService,
    },
};

/// Builds services over one pool, event channel and configuration.
pub struct ServiceFactory {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
    config: AppConfig,
}

impl ServiceFactory {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender, config: AppConfig) -> Self {
        Self {
            db_pool,
            event_sender,
            config,
        }
    }

    pub fn allocation_service(&self) -> AllocationService {
        AllocationService::new(self.db_pool.clone(), self.event_sender.clone())
    }

    pub fn settlement_service(&self) -> SettlementService {
        SettlementService::new(self.db_pool.clone(), self.event_sender.clone())
    }

    pub fn risk_service(&self) -> RiskService {
        RiskService::new(self.db_pool.clone(), self.config.risk.clone())
    }

    pub fn forecast_pipeline(&self) -> ForecastPipeline {
        ForecastPipeline::new(
            self.db_pool.clone(),
            self.event_sender.clone(),
            self.config.forecast.clone(),
        )
    }

    pub fn ingestion_service(&self) -> IngestionService {
        IngestionService::new(
            self.db_pool.clone(),
            self.event_sender.clone(),
            self.config.ingestion.clone(),
        )
    }

    pub fn account_service(&self) -> AccountService {
        AccountService::new(self.db_pool.clone(), self.event_sender.clone())
    }

    pub fn report_service(&self) -> ReportService {
        ReportService::new(
            self.db_pool.clone(),
            self.event_sender.clone(),
            self.config.risk.clone(),
        )
    }

    pub fn db_pool(&self) -> &Arc<DbPool> {
        &self.db_pool
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

/// Every service, built once and shared.
#[derive(Clone)]
pub struct ServiceContainer {
    pub allocation: Arc<AllocationService>,
    pub settlement: Arc<SettlementService>,
    pub risk: Arc<RiskService>,
    pub forecast: Arc<ForecastPipeline>,
    pub ingestion: Arc<IngestionService>,
    pub accounts: Arc<AccountService>,
    pub reports: Arc<ReportService>,
}

impl ServiceContainer {
    pub fn new(factory: &ServiceFactory) -> Self {
        Self {
            allocation: Arc::new(factory.allocation_service()),
            settlement: Arc::new(factory.settlement_service()),
            risk: Arc::new(factory.risk_service()),
            forecast: Arc::new(factory.forecast_pipeline()),
            ingestion: Arc::new(factory.ingestion_service()),
            accounts: Arc::new(factory.account_service()),
            reports: Arc::new(factory.report_service()),
        }
    }
}
