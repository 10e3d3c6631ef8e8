pub mod config;
pub mod decoder;
pub mod error;
pub mod http_client;
pub mod model;
pub mod normalizer;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod server;
pub mod session;
pub mod stream;
pub mod telemetry;
pub mod translator;
#[cfg(test)]
pub mod test_util;
