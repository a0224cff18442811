pub mod config;
pub mod content;
pub mod factory;
pub mod handlers;
pub mod humanize;
pub mod observability;
pub mod ole;
