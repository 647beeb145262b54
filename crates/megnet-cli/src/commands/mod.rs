pub mod graph;
pub mod predict;
