pub mod error;
pub mod kernel;
pub mod services;

// Re-export specific items for convenient access
pub use error::{AgentError, Result, StorageError, TransportError};
pub use kernel::agent::{Agent, AgentBuilder, FlushOutcome};
pub use kernel::config::AgentConfig;
pub use kernel::delivery::Transport;
pub use kernel::event::{Envelope, EventKind, Payload};
pub use kernel::host::{HostContext, KeyValueStorage, PageContext};
pub use kernel::source::{ObservationSource, Signal, SignalChannel, SignalKind};
