pub mod artifact;
pub mod config;
