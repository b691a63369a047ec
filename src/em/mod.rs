pub mod accumulator;
pub mod driver;
