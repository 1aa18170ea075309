// Reminders module

pub mod controllers;
pub mod models;
pub mod repositories;
pub mod services;

pub use models::{ReminderRecord, ReminderType};
pub use services::{ReminderPolicy, ReminderService};
