pub mod movie;
pub mod user;
