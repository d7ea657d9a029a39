pub mod config;
pub mod crypto;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod jobs;
pub mod log;
pub mod notify;
pub mod otp;
pub mod profiles;
pub mod schema;
pub mod service;
pub mod storage;
pub mod uploads;
