pub mod partial_payment_policy;
pub mod payment_service;
pub mod signature;

pub use partial_payment_policy::{ensure_partial_config_mutable, validate_payment, PaymentRejection};
pub use payment_service::{NewPayment, PaymentAmount, PaymentOutcome, PaymentService};
pub use signature::{sign_payload, verify_signature};
