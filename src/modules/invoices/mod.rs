// Invoices module

pub mod controllers;
pub mod models;
pub mod repositories;
pub mod services;

pub use models::{Invoice, InvoiceStatus, LineItem};
pub use repositories::{InMemoryInvoiceRepository, MySqlInvoiceRepository};
pub use services::InvoiceService;
