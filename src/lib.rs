pub mod cli;
pub mod config;
pub mod detector;
pub mod server;
