//! Services module for business logic

pub mod events;
pub mod payment_session;
pub mod refund;
