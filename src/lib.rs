pub mod app;
pub mod bot;
pub mod chat;
pub mod config;
pub mod fetch;
pub mod job;
pub mod observability;
pub mod queue;
pub mod state;
pub mod status;
pub mod worker;
