//! # Vardar Load Store
//!
//! Typed key-value view of the load telemetry replicated between brokers.
//!
//! The load balancer reads two instances of this store: one keyed by broker
//! id holding `BrokerLoadData`, one keyed by bundle id holding `BundleData`.
//! Reporters push entries, the decision engine reads snapshots and listens
//! for changes. The store never merges values: a push replaces whatever was
//! there.

mod errors;
pub use errors::{LoadStoreError, Result};

mod store;
pub use store::LoadDataStore;

mod watch;
pub use watch::{StoreEvent, StoreEventStream};

mod memory;
pub use memory::MemoryLoadStore;
