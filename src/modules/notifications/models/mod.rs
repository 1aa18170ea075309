mod notice;

pub use notice::{
    InvoiceIssuedNotice, PaymentReceivedNotice, PublicLinks, Recipient, ReminderNotice,
};
