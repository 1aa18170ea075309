mod reminder;

pub use reminder::{
    normalize_custom_message, ReminderDecision, ReminderDenial, ReminderRecord, ReminderTrigger,
    ReminderType, SendReminderRequest, SweepReport, SweptInvoice, MAX_CUSTOM_MESSAGE_CHARS,
};
