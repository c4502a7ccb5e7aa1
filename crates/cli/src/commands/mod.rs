pub mod mirror;
pub mod seed;
