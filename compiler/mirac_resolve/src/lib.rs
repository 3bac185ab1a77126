pub mod candidate;
pub mod error;
pub mod invoke;
pub mod levels;
pub mod models;
pub mod processors;
pub mod resolver;
pub mod span;
pub mod tower;
