// Payments ledger module

pub mod controllers;
pub mod models;
pub mod repositories;
pub mod services;

pub use models::{PaymentMethod, PaymentRecord, PaymentSource};
pub use services::PaymentService;
