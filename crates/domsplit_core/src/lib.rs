pub mod debug_tools;
pub mod diagnostic;
pub mod graph;
pub mod hash;
pub mod result;

pub use self::result::*;
