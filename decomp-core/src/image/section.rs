//! [`Section`]: one contiguous range of the image's address space.

/// Section permission bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Permissions {
    /// Readable.
    pub read: bool,
    /// Writable.
    pub write: bool,
    /// Executable.
    pub execute: bool,
}

impl Permissions {
    /// `r-x`, the typical code-section permission set.
    pub const CODE: Permissions = Permissions { read: true, write: false, execute: true };
    /// `rw-`, the typical data-section permission set.
    pub const DATA: Permissions = Permissions { read: true, write: true, execute: false };
    /// `r--`, read-only data (rodata / jump tables).
    pub const RODATA: Permissions = Permissions { read: true, write: false, execute: false };
}

/// What a section is generally used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    /// Executable machine code.
    Code,
    /// Initialized data.
    Data,
    /// Zero-initialized data with no backing bytes in the file.
    Bss,
}

/// One contiguous, named range of the image.
#[derive(Debug, Clone)]
pub struct Section {
    name: String,
    base_address: u64,
    size: u64,
    permissions: Permissions,
    kind: SectionKind,
    bytes: Vec<u8>,
}

impl Section {
    /// Constructs a section backed by `bytes` (for `Bss`, `bytes` should
    /// be empty; reads fall back to zero per the image's byte-read
    /// fallback chain).
    pub fn new(name: impl Into<String>, base_address: u64, size: u64, permissions: Permissions, kind: SectionKind, bytes: Vec<u8>) -> Section {
        Section { name: name.into(), base_address, size, permissions, kind, bytes }
    }

    /// Section name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// First address covered by this section.
    pub fn base_address(&self) -> u64 {
        self.base_address
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Permission bits.
    pub fn permissions(&self) -> Permissions {
        self.permissions
    }

    /// Section kind.
    pub fn kind(&self) -> SectionKind {
        self.kind
    }

    /// True iff `address` falls within `[base_address, base_address+size)`.
    pub fn contains(&self, address: u64) -> bool {
        address >= self.base_address && address < self.base_address + self.size
    }

    /// Reads `len` bytes starting at `address`, zero-filling any portion
    /// beyond the backing buffer (covers `Bss` and the tail of a section
    /// whose file size is smaller than its in-memory size).
    pub fn read(&self, address: u64, len: usize) -> Vec<u8> {
        let mut out = vec![0u8; len];
        let offset = (address - self.base_address) as usize;
        for (i, slot) in out.iter_mut().enumerate() {
            if let Some(b) = self.bytes.get(offset + i) {
                *slot = *b;
            }
        }
        out
    }
}
