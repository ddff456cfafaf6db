pub mod error;
pub mod jwt;

pub use error::{ApiError, ApiResult};
pub use jwt::JwtUtil;
