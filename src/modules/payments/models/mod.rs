mod payment_record;

pub use payment_record::{
    normalize_external_ref, MarkPaidRequest, PaymentMethod, PaymentRecord, PaymentResponse,
    PaymentSource, RecordPaymentRequest,
};
