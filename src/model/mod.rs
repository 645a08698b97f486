pub mod code;
pub mod node;
pub mod event;
pub mod config;

pub use code::compare_codes;
pub use node::*;
pub use event::*;
pub use config::*;
