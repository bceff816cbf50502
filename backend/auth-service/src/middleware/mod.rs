pub mod jwt_auth;
pub mod rate_limit;

pub use jwt_auth::{bearer_token, require_access_token, AuthUser};
pub use rate_limit::{auth_rate_limit, client_ip, global_rate_limit};
