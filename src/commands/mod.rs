pub mod fun;
pub mod quotes;
