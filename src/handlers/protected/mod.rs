// handlers/protected/mod.rs - handlers behind the Authorization key middleware
//
// Each handler receives the request's TenantKey as an extension and builds a
// partition-scoped DocumentService from the shared state.
pub mod documents;
pub mod me;

pub use documents::*;
pub use me::me;
pub use me::put as me_put;
pub use me::delete as me_delete;
