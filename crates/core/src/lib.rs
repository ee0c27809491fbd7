// blogstore Core - Records, Mapper & Ports
// NO infrastructure dependencies: adapters live in blogstore-infra-sqlite

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod mapper;
pub mod port;
pub mod statement;

pub use config::DataConfig;
pub use error::{AppError, Outcome, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
