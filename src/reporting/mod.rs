pub mod client;
pub mod operations;

pub use client::{HttpTransport, Transport, TransportResponse};
pub use operations::{send_report, DeliveryError, DeliveryOutcome, ReportError};
