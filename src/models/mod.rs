pub mod forum;
pub mod vote;

pub use forum::*;
pub use vote::*;
