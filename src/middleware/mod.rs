pub mod bearer;
pub mod security;
