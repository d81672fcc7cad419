pub mod candidate;
pub mod collection;
pub mod creator;
pub mod item;

pub use candidate::*;
pub use collection::*;
pub use creator::*;
pub use item::*;
