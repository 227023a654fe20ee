pub mod cli;
pub mod convert;
pub mod errors;
pub mod export;
pub mod images;
pub mod models;
pub mod server;
pub mod storage;
pub mod upstream;
