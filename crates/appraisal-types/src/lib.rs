pub mod calculation;
pub mod damage;
pub mod diagnostic;
pub mod error;
pub mod estimate;
pub mod ids;
pub mod parts_search;
pub mod pending;
pub mod record;
pub mod section;
pub mod value;

pub use calculation::{CalculationResult, CenterTotal};
pub use damage::{DamageAssessment, DamageCenter, Part, Repair, Work};
pub use diagnostic::{ErrorKind, Severity, StoreDiagnostic};
pub use error::DomainError;
pub use estimate::{
    DEFAULT_ESTIMATE_TYPE, Estimate, EstimateCalculations, EstimateValidation,
};
pub use ids::{derive_part_id, new_center_id};
pub use parts_search::{PartResult, PartsSearch, SearchRecord, SearchSummary};
pub use pending::PendingUpdate;
pub use record::{
    AliasConflict, AliasValue, AuditCounters, CALCULATIONS_KEY, CaseRecord, SCHEMA_VERSION,
    SystemSection,
};
pub use section::{DamageOp, PartsSearchOp, SectionName, SectionPayload};
pub use value::{Patch, Section};
