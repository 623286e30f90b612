//! The validated configuration tree consumed by the files stage (§3).
//!
//! This crate only models data; parsing and validation (partition GUIDs,
//! label lengths, schema versioning) belong to an out-of-scope config
//! parser/validator that hands this crate an already-validated [`Config`].

mod fstab;
mod partition;
mod types;

pub use fstab::{pseudo_filesystem_records, record_for_filesystem, render, FstabRecord};
pub use partition::{Partition, GUID_REGEX, PARTITION_LABEL_MAX_LEN};
pub use types::*;
