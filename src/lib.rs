pub mod cli;
pub mod config;
pub mod context;
pub mod crypto;
pub mod errors;
pub mod repository;
pub mod storage;
pub mod unlock;
