//! sum-core: motor de ciclo de vida y caché del dispatcher
pub mod channel;
pub mod constants;
pub mod consumer;
pub mod coordinator;
pub mod errors;
pub mod event;
pub mod hashing;
pub mod keys;
pub mod retention;
pub mod store;

pub use channel::{InMemoryBroker, InboundMessage, MessageSink, MessageSource};
pub use consumer::{ConsumerLoop, StopHandle};
pub use coordinator::LifecycleCoordinator;
pub use errors::{ChannelError, CoreError, StoreError};
pub use event::{ForwardedWork, StageEventKind, StageMessage, Topic};
pub use retention::CacheRetentionPolicy;
pub use store::{CleanupStats, InMemorySummaryStore, RebindOutcome, StoreResult, SummaryStore};
