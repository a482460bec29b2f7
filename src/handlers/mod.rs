pub mod health;
pub mod log_types;
pub mod logs;
pub mod trackers;
pub mod ws;
