pub mod block;
pub mod engine;
pub mod fs;
pub mod shell;
