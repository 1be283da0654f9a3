pub mod blockchain_guard;
pub mod expiry;
pub mod idempotency;
pub mod state_machine;
pub mod types;
