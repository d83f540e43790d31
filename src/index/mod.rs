pub mod keys;
pub mod writer;

pub use writer::IndexWriter;
