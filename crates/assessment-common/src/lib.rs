pub mod embedding;
pub mod error;
pub mod memory;
pub mod oracle;
pub mod redis;
pub mod vectordb;
