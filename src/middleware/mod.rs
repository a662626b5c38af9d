pub mod allow_list;
pub mod auth;
pub mod response;

pub use allow_list::{AllowList, PathPattern};
pub use auth::{auth_gate, Admission, AuthGate, AuthUser};
pub use response::{ApiResponse, ApiResult};
