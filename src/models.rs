pub mod auth;
pub mod unit;
pub mod item;
pub mod movement;
pub mod proof;
