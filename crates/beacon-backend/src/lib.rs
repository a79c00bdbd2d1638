pub mod memory;
pub mod noop;
pub mod registry;

pub use memory::MemoryBackend;
pub use noop::NoopBackend;
pub use registry::{BackendFactory, BackendRegistry};
