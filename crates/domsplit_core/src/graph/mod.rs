#[allow(clippy::module_inception)]
mod graph;
mod graph_builder;
mod graph_dot;
mod traversal;

pub use self::graph::*;
pub use self::graph_builder::*;
pub use self::graph_dot::*;
pub use self::traversal::*;
