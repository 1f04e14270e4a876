//! HTTP surface: JSON routes over the book services.

mod error;
mod middleware;
mod public;

pub use error::{ApiError, ApiErrorBody, ApiErrorMessage};
pub use middleware::RequestContext;
pub use public::{HttpState, build_router};
