pub mod callback;
pub mod platform;
