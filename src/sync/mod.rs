pub mod connection;
pub mod reconciler;
pub mod session;
pub mod source;
pub mod transport;

pub use connection::{Connection, ConnectionStatus, RetryPolicy};
pub use reconciler::{Applied, Reconciler};
pub use session::{SyncSession, TickReport};
pub use source::NodeSource;
pub use transport::{Transport, TransportError, TransportMessage};
