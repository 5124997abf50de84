pub mod digest;
pub mod index;
pub mod media_types;

pub use digest::*;
pub use index::*;
