pub mod invoice;
pub mod line_item;

pub use invoice::{Invoice, InvoiceStatus};
pub use line_item::InvoiceLineItem;
