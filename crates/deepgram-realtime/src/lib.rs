mod client;
pub mod types;

pub use client::config::{Config, ConfigBuilder};
pub use client::stats::Stats;
pub use client::{connect, connect_with_config, Client, ServerRx};
