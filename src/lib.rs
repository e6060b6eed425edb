pub mod bot;
pub mod config;
pub mod delivery;
pub mod dialogue;
pub mod domain;
pub mod feeds;
pub mod learning;
pub mod lint;
pub mod listings_client;
pub mod routes;
pub mod scheduler;
pub mod startup;
pub mod store;
pub mod telegram_client;
pub mod telemetry;
pub mod utils;
