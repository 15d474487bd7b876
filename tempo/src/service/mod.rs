pub mod admin;
pub mod delete;
pub mod download;
pub mod eviction;
pub mod queue;
pub mod shutdown;
pub mod upload;
