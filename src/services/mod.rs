// Order lifecycle
pub mod order_status;
pub mod orders;
pub mod pricing;
pub mod sequence;

// Stock bookkeeping
pub mod inventory;

// Collaborators consumed by the lifecycle services
pub mod audit;
pub mod catalog;
pub mod clock;

// Service factory for dependency injection
pub mod factory;
