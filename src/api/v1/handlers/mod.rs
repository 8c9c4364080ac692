pub mod admin;
pub mod greetings;
pub mod health;
pub mod me;
