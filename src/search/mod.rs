pub mod intersect;
pub mod phrase;
pub mod posting;

pub use intersect::Intersector;
pub use posting::PostingIterator;
