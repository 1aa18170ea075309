pub mod repository;

pub use repository::{lock_invoice, InvoiceAccess, InvoiceStore, InvoiceUnitOfWork};
