#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod tantivy_utils;
pub mod index;
pub mod search;

pub use index::TantivyIndexer;
pub use search::{FullTextSearcher, SparseSearcher};
