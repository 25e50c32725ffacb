pub mod auth;
pub mod items;
pub mod occurrences;
pub mod dashboard;
