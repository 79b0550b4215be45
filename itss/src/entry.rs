//! Directory entries

/// Storage space an entry's content lives in.
///
/// The format allows arbitrarily many spaces, but real archives only use
/// the first two. Anything else is kept but reads as empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Space {
    Uncompressed,
    Compressed,
    Other(u64),
}

impl Space {
    pub(crate) fn from_raw(raw: u64) -> Self {
        match raw {
            0 => Self::Uncompressed,
            1 => Self::Compressed,
            n => Self::Other(n),
        }
    }
}

/// Whether an entry names a file or a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// Which namespace an entry's path belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryClass {
    /// Document content, rooted at `/`
    Normal,
    /// Bookkeeping objects without a leading `/`
    Meta,
    /// System objects under `/#` or `/$`
    Special,
}

/// One named object in the archive directory.
///
/// Entries are plain values: clone one to keep using it while reading from
/// the archive.
#[derive(Debug, Clone)]
pub struct Entry {
    /// Archive-relative path, forward-slash separated
    pub path: String,
    pub space: Space,
    /// Start offset within the space's content unit
    pub start: u64,
    /// Length in bytes (decompressed, for compressed entries)
    pub length: u64,
    pub kind: EntryKind,
    pub class: EntryClass,
}

impl Entry {
    pub(crate) fn new(path: String, space: u64, start: u64, length: u64) -> Self {
        let (kind, class) = classify(&path);
        Self {
            path,
            space: Space::from_raw(space),
            start,
            length,
            kind,
            class,
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn is_normal(&self) -> bool {
        self.class == EntryClass::Normal
    }

    pub fn is_meta(&self) -> bool {
        self.class == EntryClass::Meta
    }

    pub fn is_special(&self) -> bool {
        self.class == EntryClass::Special
    }
}

fn classify(path: &str) -> (EntryKind, EntryClass) {
    let kind = if path.ends_with('/') {
        EntryKind::Directory
    } else {
        EntryKind::File
    };

    let bytes = path.as_bytes();
    let class = if bytes.first() == Some(&b'/') {
        if matches!(bytes.get(1), Some(b'#' | b'$')) {
            EntryClass::Special
        } else {
            EntryClass::Normal
        }
    } else {
        EntryClass::Meta
    };

    (kind, class)
}
