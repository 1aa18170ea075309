pub mod invoice_repository;
pub mod memory_repository;

pub use invoice_repository::{MySqlInvoiceRepository, MySqlUnitOfWork};
pub use memory_repository::InMemoryInvoiceRepository;
