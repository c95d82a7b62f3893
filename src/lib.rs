pub mod config;
pub mod push;
pub mod quotes;
pub mod valuation;
