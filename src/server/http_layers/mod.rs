mod origin_check;
mod requests_logging;

pub use origin_check::check_origin;
pub use requests_logging::{log_requests, RequestsLoggingLevel};
