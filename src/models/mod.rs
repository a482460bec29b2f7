pub mod log_entry;
pub mod log_type;
pub mod tracker;
