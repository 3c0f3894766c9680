//! HTTP API handlers for clubcard-registry

pub mod dashboard;
pub mod health;
pub mod search;
pub mod session;

pub use dashboard::{get_dashboard, get_insights, reload_records};
pub use health::health_routes;
pub use search::search_member;
pub use session::{begin_edit, cancel_edit, get_session, save_changes, update_draft};
