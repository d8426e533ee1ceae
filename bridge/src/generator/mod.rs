pub mod seed;
pub mod synthetic;
