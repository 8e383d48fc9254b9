// handlers/mod.rs - two handler tiers
//
// Public (no key) → /health
// Protected (Authorization key required) → /me and the document routes
pub mod protected;
pub mod public;
