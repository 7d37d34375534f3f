pub mod api;
pub mod common;
pub mod credentials;
pub mod memory;
pub mod mongodb;
pub mod otp;
pub mod store;
