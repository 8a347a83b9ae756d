//! Request pipeline middleware: session authentication, role gating,
//! CSRF checking, and request logging.

mod csrf_middleware;
mod jwt_middleware;
mod request_logger;
mod role_guard;

pub use csrf_middleware::CsrfProtect;
pub use jwt_middleware::{CurrentUser, SessionAuth};
pub use request_logger::RequestLogger;
pub use role_guard::RequireRole;
