//! [`Symbol`] and [`Relocation`].

/// What a [`Symbol`] names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    /// A function entry point.
    Function,
    /// A data object.
    Object,
    /// Names a whole section.
    Section,
    /// No type information.
    NoType,
}

/// A named entity in the image.
#[derive(Debug, Clone)]
pub struct Symbol {
    kind: SymbolKind,
    name: String,
    value: Option<u64>,
}

impl Symbol {
    /// Constructs a symbol.
    pub fn new(kind: SymbolKind, name: impl Into<String>, value: Option<u64>) -> Symbol {
        Symbol { kind, name: name.into(), value }
    }

    /// Symbol kind.
    pub fn kind(&self) -> SymbolKind {
        self.kind
    }

    /// Symbol name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Associated address, if known.
    pub fn value(&self) -> Option<u64> {
        self.value
    }

    /// The calling-convention-relevant suffix of a stdcall-mangled name
    /// (`_foo@8` → `Some(8)`), used by §4.2's convention-selection rule.
    /// Degrades to `None` (never panics) for any name that doesn't match,
    /// per §7's "unknown symbol ... degrade to conservative defaults".
    pub fn stdcall_arg_bytes(&self) -> Option<u32> {
        let at = self.name.rfind('@')?;
        self.name[at + 1..].parse().ok()
    }
}

/// A relocation entry: at `address`, `size` bytes should be read from
/// `target` rather than from the section's raw bytes.
#[derive(Debug, Clone)]
pub struct Relocation {
    address: u64,
    size: u32,
    target_symbol: String,
    /// Resolved value of the target symbol, if known at disassembly time.
    resolved_value: Option<u64>,
}

impl Relocation {
    /// Constructs a relocation.
    pub fn new(address: u64, size: u32, target_symbol: impl Into<String>, resolved_value: Option<u64>) -> Relocation {
        Relocation { address, size, target_symbol: target_symbol.into(), resolved_value }
    }

    /// Address the relocation applies at.
    pub fn address(&self) -> u64 {
        self.address
    }

    /// Size in bytes of the relocated field.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Name of the target symbol.
    pub fn target_symbol(&self) -> &str {
        &self.target_symbol
    }

    /// Resolved value, if known.
    pub fn resolved_value(&self) -> Option<u64> {
        self.resolved_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stdcall_suffix_parses() {
        let s = Symbol::new(SymbolKind::Function, "_foo@8", Some(0x1000));
        assert_eq!(s.stdcall_arg_bytes(), Some(8));
    }

    #[test]
    fn non_stdcall_name_degrades_to_none() {
        let s = Symbol::new(SymbolKind::Function, "main", Some(0x1000));
        assert_eq!(s.stdcall_arg_bytes(), None);
    }
}
