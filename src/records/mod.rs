//! Request records
//!
//! - [`RequestRecord`]: raw timing of one request, with validity rule and
//!   derived latencies
//! - [`ParsedResponseRecord`]: the same record after text extraction and
//!   tokenization, which is what the metrics engine consumes
//! - [`ErrorSummary`]: failed requests grouped by [`ErrorDetail`]

mod error;
mod parsed;
mod record;

pub use error::{ErrorCount, ErrorDetail, ErrorSummary, ErrorSummaryReport};
pub use parsed::{ParsedResponseRecord, ResponseData};
pub use record::{RequestRecord, ResponseEntry, TextResponse};
