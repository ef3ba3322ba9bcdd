pub mod auth;
pub mod request_id;

pub use auth::{hash_api_key, ProjectIdentity, ProjectKeyAuth};
pub use request_id::RequestId;
