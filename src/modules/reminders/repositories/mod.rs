pub mod reminder_repository;

pub use reminder_repository::ReminderRepository;
