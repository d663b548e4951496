// Core modules for the lodestore in-memory data-structure store
pub mod error; // StoreError + Result alias
pub mod config; // sweep and scan tunables
pub mod value; // Value shapes + SortedSet
pub mod expiry; // deadline heap for active expiration
pub mod storage; // Keyspace: entries, lazy expiry, scan order
pub mod types; // per-shape command handlers
pub mod scan; // glob Pattern, SCAN/KEYS, ScanIter
pub mod protocol; // Cmd parsing + Reply
pub mod shard; // Shard::exec, batches, Pipeline
pub mod expire; // background expirer thread

// Re-export the public surface for easier access
pub use config::Config;
pub use error::{Result, StoreError};
pub use expire::{spawn_expirer, ExpirerHandle};
pub use protocol::{Cmd, Reply};
pub use scan::{Pattern, ScanIter};
pub use shard::{CancelToken, Pipeline, Shard};
pub use storage::Keyspace;
pub use value::{ScoreBound, TypeTag, Value};

// Id of the single shard a process runs
pub const DEFAULT_SHARD: usize = 0;
