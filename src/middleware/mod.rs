pub mod cors;
pub mod response;
pub mod tenant_key;

pub use cors::{cors_headers, cors_layer};
pub use response::{ApiResponse, ApiResult};
pub use tenant_key::{require_tenant_key, TenantKey};
