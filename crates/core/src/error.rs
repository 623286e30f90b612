//! The error taxonomy of §7, given concrete Rust shape.

use thiserror::Error;

/// Everything that can go wrong while running the files stage.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("filesystem {0:?} is referenced but not defined")]
    FilesystemUndefined(String),

    #[error("mounting filesystem {name:?}")]
    Mount {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("unmounting filesystem {name:?}")]
    Unmount {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("applying image to filesystem {name:?}")]
    Image {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("creating {path}")]
    EntryCreation {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("opening stage root")]
    StageRoot(#[source] anyhow::Error),

    #[error("account operation for {who:?}")]
    Account {
        who: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("unit operation for {unit:?}")]
    Unit {
        unit: String,
        #[source]
        source: anyhow::Error,
    },
}
