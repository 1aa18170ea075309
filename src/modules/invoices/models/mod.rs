mod invoice;
mod line_item;

pub use invoice::{
    CreateInvoiceRequest, CreateLineItemRequest, Invoice, InvoiceResponse, InvoiceStatus,
    PublicInvoiceView, UpdateInvoiceRequest, MAX_TAX_RATE_BPS,
};
pub use line_item::LineItem;
