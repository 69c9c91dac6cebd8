// Protected handlers (JWT authentication required, routed under /api)
//
// Every handler receives the verified `Operator` extension and scopes all
// store access by its id.
pub mod billing;
pub mod notifications;
pub mod utils;
