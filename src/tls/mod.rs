pub mod config;
pub mod insecure;
