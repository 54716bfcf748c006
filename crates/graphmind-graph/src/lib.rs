pub mod memory;

pub use graphmind_core::GraphAdapter;
pub use memory::InMemoryGraphAdapter;
