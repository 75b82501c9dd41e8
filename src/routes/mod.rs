// Export all route modules
pub mod admin;
pub mod auth;
pub mod donations;
pub mod schools;

// Re-export all route handlers for easy importing
pub use admin::*;
pub use auth::*;
pub use donations::*;
pub use schools::*;
