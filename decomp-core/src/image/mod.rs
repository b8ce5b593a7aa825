//! [`Image`]: the immutable description of the input binary.

mod platform;
mod section;
mod symbol;

pub use platform::{Architecture, Endianness, OperatingSystem, Platform};
pub use section::{Permissions, Section, SectionKind};
pub use symbol::{Relocation, Symbol, SymbolKind};

/// Immutable description of the input binary, built once by the parser
/// and read-only thereafter (§3 Lifecycles).
#[derive(Debug, Clone)]
pub struct Image {
    platform: Platform,
    sections: Vec<Section>,
    symbols: Vec<Symbol>,
    relocations: Vec<Relocation>,
}

impl Image {
    /// Constructs an image from its parsed parts.
    pub fn new(platform: Platform, sections: Vec<Section>, symbols: Vec<Symbol>, relocations: Vec<Relocation>) -> Image {
        Image { platform, sections, symbols, relocations }
    }

    /// The image's platform triple.
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// All sections, in the order the parser produced them.
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// All symbols.
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// All relocations.
    pub fn relocations(&self) -> &[Relocation] {
        &self.relocations
    }

    /// The section containing `address`, if any.
    pub fn section_at(&self, address: u64) -> Option<&Section> {
        self.sections.iter().find(|s| s.contains(address))
    }

    /// Finds a symbol by exact name.
    pub fn symbol_named(&self, name: &str) -> Option<&Symbol> {
        self.symbols.iter().find(|s| s.name() == name)
    }

    /// Finds the symbol whose value equals `address`, if any.
    pub fn symbol_at(&self, address: u64) -> Option<&Symbol> {
        self.symbols.iter().find(|s| s.value() == Some(address))
    }

    /// Finds a relocation covering `address`, if any.
    pub fn relocation_at(&self, address: u64) -> Option<&Relocation> {
        self.relocations.iter().find(|r| r.address() == address)
    }

    /// Reads `len` bytes starting at `address` via the fallback chain
    /// from §3: relocation override (if the relocation's value is known
    /// and its size matches) → section bytes → zero. Never fails — a
    /// read entirely outside any section returns all zero bytes, per §7
    /// ("missing section ... degrade to conservative defaults").
    pub fn read_bytes(&self, address: u64, len: usize) -> Vec<u8> {
        if let Some(reloc) = self.relocation_at(address) {
            if reloc.size() as usize == len {
                if let Some(value) = reloc.resolved_value() {
                    return value.to_le_bytes()[..len.min(8)].to_vec();
                }
            }
        }
        if let Some(section) = self.section_at(address) {
            return section.read(address, len);
        }
        vec![0u8; len]
    }

    /// Reads a little/big-endian (per `self.platform().endianness`)
    /// unsigned integer of `size_bytes` (1, 2, 4, or 8) at `address`.
    pub fn read_uint(&self, address: u64, size_bytes: usize) -> u64 {
        let bytes = self.read_bytes(address, size_bytes);
        let mut buf = [0u8; 8];
        match self.platform.endianness {
            Endianness::Little => buf[..size_bytes].copy_from_slice(&bytes),
            Endianness::Big => buf[8 - size_bytes..].copy_from_slice(&bytes),
        }
        match self.platform.endianness {
            Endianness::Little => u64::from_le_bytes(buf),
            Endianness::Big => u64::from_be_bytes(buf),
        }
    }
}
