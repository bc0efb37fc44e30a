pub mod coordinator;
pub mod local;
pub mod outbox;
pub mod remote;

pub use coordinator::{remote_timestamp, Coordinator, Reconciled, SaveSource, SignInResolution};
pub use local::{LocalError, LocalStore, MemoryStore};
pub use outbox::Outbox;
pub use remote::{Identity, MemoryRemote, RemoteError, RemoteRow, RemoteStore, RemoteWrite};
