pub mod bubble;
pub mod engine;
pub mod filter;
pub mod matcher;
pub mod rewrite;

pub use bubble::*;
pub use engine::*;
pub use filter::*;
pub use matcher::*;
pub use rewrite::*;

#[cfg(test)]
mod tests;
