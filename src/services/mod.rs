pub mod consistency;

pub use consistency::ConsistencyService;
