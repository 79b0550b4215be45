//! ITSS (Compiled HTML Help / CHM) archive reading
//!
//! ITSS is the container format behind Microsoft's `.chm` help files. This
//! crate parses the binary container, builds a directory of the stored
//! objects, and serves byte ranges from either the uncompressed section or
//! the LZX-compressed section, backed by a bounded cache of decompressed
//! blocks.
//!
//! Diagnostics are emitted through [`tracing`]; install a subscriber to
//! observe them.

pub mod archive;
pub mod entry;
pub mod error;
pub mod header;
pub mod source;

mod cache;
mod decompress;
mod directory;
mod ioutils;

#[cfg(test)]
pub(crate) mod testutil;

pub use archive::Archive;
pub use entry::{Entry, EntryClass, EntryKind, Space};
pub use error::{Error, Result};
pub use header::{ItsfHeader, ItspHeader};
pub use source::{ByteSource, FileSource, MemorySource};

/// Path of the LZX reset table object.
pub const RESET_TABLE_PATH: &str = "::DataSpace/Storage/MSCompressed/Transform/\
{7FC28940-9D31-11D0-9B27-00A0C91E9C7C}/InstanceData/ResetTable";

/// Path of the LZX control data object.
pub const CONTROL_DATA_PATH: &str = "::DataSpace/Storage/MSCompressed/ControlData";

/// Path of the compressed content object.
pub const CONTENT_PATH: &str = "::DataSpace/Storage/MSCompressed/Content";
