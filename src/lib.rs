pub mod api;
pub mod core;
pub mod plan;
pub mod storage;
