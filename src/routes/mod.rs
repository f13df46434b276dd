/// Router Module Index
///
/// Routing is split by access level so the auth layer is applied per router
/// rather than per handler.

/// Anonymous reading, comments, likes, and the credential endpoints.
pub mod public;

/// Work editing. Requires a verified admin token.
pub mod authenticated;

/// Comment moderation under `/admin`. Requires a verified admin token.
pub mod admin;
