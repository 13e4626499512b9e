//! Shared constants between the host stage and the in-VM forge stage.
//!
//! These must be identical on both sides of the VM boundary.

/// Names inside a template directory.
pub mod template {
    /// Descriptor file present in every template directory.
    pub const DESCRIPTOR: &str = "config.json";

    /// Overlay tree mirrored onto the container root filesystem.
    pub const OVERLAY_DIR: &str = "Root";
}

/// Artifact naming.
pub mod artifact {
    /// Suffix of the flat archive the forge exports into the staging root.
    pub const STAGED_SUFFIX: &str = "_Image";

    /// Extension the exported archive may carry when the runtime appends one.
    pub const STAGED_EXTENSION: &str = "tar.gz";

    /// Extension of artifacts stored in the image catalog.
    pub const CATALOG_EXTENSION: &str = "tar.gz";
}

/// Paths inside the ephemeral build container.
pub mod container {
    /// Temporary directory holding provisioning scripts.
    pub const SETUP_DIR: &str = "/SetupTemp";

    /// Scheduler directory receiving startup jobs.
    pub const CRON_DIR: &str = "/etc/cron.d";

    /// Principal used when a startup command has no `RunAs`.
    pub const DEFAULT_USER: &str = "root";

    /// Mode applied to pushed scripts and startup jobs.
    pub const EXEC_MODE: &str = "755";
}

/// CLI entry points invoked across the boundary.
pub mod entrypoint {
    /// File name of the forge binary inside the staging area.
    pub const BINARY: &str = "boxforge";

    /// Subcommand running the in-VM forge stage.
    pub const BUILD_IMAGES: &str = "buildimages";
}
