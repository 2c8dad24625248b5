/// Logical name of the library every loader setup pass starts with
pub const DEFAULT_LIBRARY: &str = "Default";

/// Environment variable naming a loader config file, read by `create()`
pub const CONFIG_ENV_VAR: &str = "DYNLIBS_CONFIG";

/// Environment variable naming an extra library search directory (searched first)
pub const LIBRARY_DIR_ENV_VAR: &str = "DYNLIBS_LIBRARY_DIR";

/// Directory searched when no config says otherwise
pub const DEFAULT_SEARCH_DIR: &str = ".";
