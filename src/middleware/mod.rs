// Middleware modules for the CRM backend

pub mod auth;
pub mod auth_middleware;
pub mod cors;

pub use auth::AuthenticatedUser;
pub use auth_middleware::auth_middleware;
pub use cors::dynamic_cors_middleware;
