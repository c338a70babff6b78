pub mod aggregate;
pub mod baseline;
pub mod config;
pub mod fetch;
pub mod infra;
pub mod model;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod poller;
pub mod services;
pub mod store;
