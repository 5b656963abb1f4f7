// Re-export all items from the submodules
mod archive_config;
mod env_vars;

// Re-export archive config
pub use archive_config::{
    ArchiveConfig,
    RemoteConfig,
    TransportKind,
    load_or_default,
};

// Re-export path expansion helpers
pub use env_vars::{
    expand_env_vars,
    expand_path,
};
