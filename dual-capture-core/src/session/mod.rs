pub mod cancel;
pub mod capture;
pub mod engine;
pub mod negotiate;
mod worker;
