pub mod history;
pub mod mask;
pub mod shortcuts;
pub mod tools;
