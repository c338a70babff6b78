mod client;

pub use client::TflCrowdingClient;
