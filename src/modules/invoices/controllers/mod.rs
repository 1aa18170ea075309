pub mod invoice_controller;
pub mod public_controller;
