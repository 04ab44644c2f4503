pub mod config;
pub mod dashboard;
pub mod health;
pub mod search;
