pub mod config;
pub mod error;
pub mod estimate;
pub mod export;
pub mod guard;
mod handlers;
pub mod integrity;
pub mod legacy;
pub mod levi;
pub mod merge;
pub mod persistence;
pub mod queue;
pub mod sanitize;
pub mod session;
pub mod standardize;
pub mod store;

pub use config::StoreConfig;
pub use error::{IntegrityIssue, PersistenceError, StorageError, StoreError};
pub use estimate::estimate_validation;
pub use export::{ExportContent, ExportOperation, ExportSnapshot};
pub use guard::{GuardToken, RecursionGuard};
pub use integrity::{Category, IntegrityReport};
pub use legacy::legacy_mirror;
pub use levi::valuation_patch;
pub use persistence::{
    FileStore, KeyValueStore, LoadSource, LoadedSnapshot, MemoryStore, Persistence, SaveReceipt,
    Tier,
};
pub use queue::PendingQueue;
pub use sanitize::Sanitizer;
pub use session::{AlwaysValid, SessionFlag, SessionProvider};
pub use standardize::{Standardizer, normalize_plate, standardize};
pub use store::{
    ApplyOutcome, CaseStore, CaseStoreBuilder, SectionUpdate, StoreObserver, StoreStats,
};
