// src/process/mod.rs
pub mod clean;
pub mod date_parser;
pub mod normalize;
pub mod raw_table;
pub mod utils;

pub use clean::{clean, CleanedSource, CoercionReport};
pub use normalize::normalize;
pub use raw_table::RawTable;
