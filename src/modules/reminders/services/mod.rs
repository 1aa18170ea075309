pub mod reminder_scheduler;
pub mod reminder_service;

pub use reminder_scheduler::ReminderPolicy;
pub use reminder_service::ReminderService;
