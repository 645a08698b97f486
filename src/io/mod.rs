pub mod config_io;
pub mod journal;
pub mod lock;
pub mod logging;
pub mod project_io;
pub mod store;
pub mod watcher;
