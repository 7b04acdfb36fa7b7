#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod memory;
pub mod schema;
pub mod search;
pub mod store;

pub use memory::MemoryStore;
pub use search::VectorSearcher;
pub use store::LanceStore;
