pub mod dialer;
pub mod engine;
pub mod store;
pub mod trace;
pub mod transport;
