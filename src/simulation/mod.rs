pub mod memory;
pub mod scenario;
