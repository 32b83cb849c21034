pub mod auth;
pub mod client;
pub mod envelope;
pub mod identity;
