//! Invoice Ledger & Reminder Engine
//!
//! Invoices carry a status derived from an append-only payments ledger,
//! a partial-payment policy, and escalating payment reminders with a
//! per-invoice cooldown. Every mutation of an invoice runs under a
//! single-writer unit of work so the ledger and the cached status never
//! drift apart.

pub mod app;
pub mod config;
pub mod core;
pub mod middleware;
pub mod modules;

// Re-export commonly used types
pub use app::AppServices;
pub use modules::invoices;
pub use modules::notifications;
pub use modules::payments;
pub use modules::reminders;
