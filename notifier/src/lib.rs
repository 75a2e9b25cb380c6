pub mod app;
pub mod background;
pub mod bootstrap;
pub mod config;
pub mod logging;
pub mod notification;
pub mod polling;
pub mod server;
pub mod services;
pub mod shutdown;

pub use bootstrap::{data_dir, init_foundation};
