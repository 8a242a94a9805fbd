pub mod credit;
pub mod user;
