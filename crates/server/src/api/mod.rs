pub mod error;
pub mod handlers;
pub mod headers;
pub mod middleware;
pub mod multipart;
pub mod publish;
pub mod retain;
pub mod routes;
pub mod tarball;
pub mod template;
pub mod workflow;

pub use error::{ApiError, ApiResult};
pub use routes::create_router;
