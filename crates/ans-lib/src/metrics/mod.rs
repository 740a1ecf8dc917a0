pub mod ibi;
pub mod spectrum;
