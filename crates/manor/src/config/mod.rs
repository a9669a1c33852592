mod merge;
mod record;

pub use merge::{
    apply_configuration, apply_to_registry, release_configuration, AppliedFlag, MergeError,
    MergeOutcome, SkipReason,
};
pub use record::{BoundConfiguration, CollectionPolicies, ConfigurationRecord, MergePolicy};
