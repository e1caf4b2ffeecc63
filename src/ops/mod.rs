pub mod ai;
pub mod edit_ops;
