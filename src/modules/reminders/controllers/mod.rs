pub mod reminder_controller;
