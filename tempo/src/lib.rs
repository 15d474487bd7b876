pub mod api;
pub mod config;
pub mod error;
pub mod service;
pub mod storage;
pub mod utils;

#[cfg(test)]
mod test_support;
