/// Name of the configurable every model defines for its default bank size.
pub const MEMORY_SIZE: &str = "memory_size";

/// Names a model definition may not register itself.
pub const RESERVED_NAMES: &[&str] = &[MEMORY_SIZE];

/// Prefix of the enable variable allocated for every action.
pub const EN_PREFIX: &str = "EN_";

/// Prefix of the ready variable allocated for every action.
pub const RDY_PREFIX: &str = "RDY_";
