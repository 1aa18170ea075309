pub mod access_token;
pub mod invoice_service;
pub mod status_machine;

pub use invoice_service::{InvoiceDetail, InvoiceService, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use status_machine::{derive_status, recompute, StatusChange};
