pub mod api;
pub mod config;
pub mod conversations;
pub mod database;
pub mod error;
pub mod feed;
pub mod friendships;
pub mod media;
pub mod notifications;
pub mod profiles;
pub mod realtime;
pub mod storage;
pub mod stories;
pub mod telemetry;
pub mod utils;
