// Stock and sales core
pub mod allocation;
pub mod settlement;

// Risk and demand
pub mod forecasting;
pub mod risk;

// Back office
pub mod accounts;
pub mod ingestion;
pub mod reports;

// Service factory for dependency injection
pub mod factory;
