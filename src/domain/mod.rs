//! Core domain types and logic.

pub mod adjust;
pub mod config;
pub mod error;
pub mod indicator;
pub mod lookback;
pub mod market;
pub mod normalize;
pub mod ohlcv;
pub mod paginate;
pub mod pipeline;
pub mod request;
pub mod service;
pub mod spec_parser;
pub mod symbol;
pub mod trim;
