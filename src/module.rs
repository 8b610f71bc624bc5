//! The staging module that code generation fills and the linker
//! consumes: an append-only code buffer plus side tables for labels,
//! symbols, external call sites, source lines, and comments.
//!
//! A module is created empty, appended to by the code generator,
//! sealed, then handed to the linker exactly once. The side tables
//! keyed by code offset are monotone because appends only ever happen
//! at the end of the buffer.

use std::collections::HashMap;

use thiserror::Error;

use crate::encoder::BranchFixup;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModuleError {
    #[error("duplicate label id {0}")]
    DuplicateLabel(u32),
    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),
    #[error("module is sealed")]
    Sealed,
}

/// A named location in the module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol {
    /// Byte offset into the code buffer.
    pub offset: usize,
    /// Functions and subs are code symbols; data symbols are not
    /// entered into the trampoline cross-check.
    pub is_code: bool,
}

// Extern names are overwhelmingly short runtime symbols; they live
// inline up to 22 bytes with a length byte, and spill to the heap past
// that.
const EXT_NAME_INLINE: usize = 22;

#[derive(Debug, Clone)]
enum ExtNameRepr {
    Inline { len: u8, bytes: [u8; EXT_NAME_INLINE] },
    Heap(Box<str>),
}

/// Small-string-optimized external symbol name.
#[derive(Debug, Clone)]
pub struct ExtName(ExtNameRepr);

impl ExtName {
    pub fn new(name: &str) -> ExtName {
        if name.len() <= EXT_NAME_INLINE {
            let mut bytes = [0u8; EXT_NAME_INLINE];
            bytes[..name.len()].copy_from_slice(name.as_bytes());
            ExtName(ExtNameRepr::Inline {
                len: name.len() as u8,
                bytes,
            })
        } else {
            ExtName(ExtNameRepr::Heap(name.into()))
        }
    }

    pub fn as_str(&self) -> &str {
        match &self.0 {
            ExtNameRepr::Inline { len, bytes } => {
                // The inline bytes were copied from a &str.
                std::str::from_utf8(&bytes[..*len as usize]).unwrap()
            }
            ExtNameRepr::Heap(name) => name,
        }
    }
}

impl PartialEq for ExtName {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for ExtName {}

/// One BL to an external symbol, to be routed through a trampoline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtCall {
    /// Byte offset of the BL instruction.
    pub code_offset: usize,
    name: ExtName,
}

impl ExtCall {
    /// The external symbol this call targets.
    pub fn name(&self) -> &str {
        self.name.as_str()
    }
}

/// `(code offset, source line)` pair; ascending by offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceMapEntry {
    pub code_offset: usize,
    pub source_line: u32,
}

/// Free-form code generator annotation at an offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentEntry {
    pub code_offset: usize,
    pub text: String,
}

/// A module under construction or awaiting link.
#[derive(Debug, Default)]
pub struct JitModule {
    code: Vec<u8>,
    labels: HashMap<u32, usize>,
    symbols: HashMap<String, Symbol>,
    ext_calls: Vec<ExtCall>,
    source_map: Vec<SourceMapEntry>,
    comment_map: Vec<CommentEntry>,
    fixups: Vec<BranchFixup>,
    sealed: bool,
}

impl JitModule {
    pub fn new() -> JitModule {
        JitModule::default()
    }

    /// Byte offset where the next instruction will land. Always a
    /// multiple of 4.
    pub fn current_offset(&self) -> usize {
        self.code.len()
    }

    /// Append one instruction word; returns its byte offset.
    pub fn emit(&mut self, word: u32) -> Result<usize, ModuleError> {
        if self.sealed {
            return Err(ModuleError::Sealed);
        }
        let offset = self.code.len();
        self.code.extend_from_slice(&word.to_le_bytes());
        Ok(offset)
    }

    /// Append a sequence of words (e.g. a load-immediate expansion).
    pub fn emit_all(&mut self, words: &[u32]) -> Result<usize, ModuleError> {
        let offset = self.current_offset();
        for &word in words {
            self.emit(word)?;
        }
        Ok(offset)
    }

    /// Emit a BL placeholder to an external symbol and record the call
    /// site. The linker rewrites the displacement.
    pub fn emit_ext_call(&mut self, name: &str) -> Result<usize, ModuleError> {
        let offset = self.emit(0x9400_0000)?;
        self.ext_calls.push(ExtCall {
            code_offset: offset,
            name: ExtName::new(name),
        });
        Ok(offset)
    }

    /// Record an external call at an already-emitted BL.
    pub fn record_ext_call(&mut self, code_offset: usize, name: &str) {
        debug_assert!(code_offset % 4 == 0 && code_offset < self.code.len());
        self.ext_calls.push(ExtCall {
            code_offset,
            name: ExtName::new(name),
        });
    }

    /// Bind a basic-block label to the current offset.
    pub fn bind_label(&mut self, id: u32) -> Result<(), ModuleError> {
        if self.sealed {
            return Err(ModuleError::Sealed);
        }
        if self.labels.contains_key(&id) {
            return Err(ModuleError::DuplicateLabel(id));
        }
        self.labels.insert(id, self.current_offset());
        Ok(())
    }

    /// Define a symbol at the current offset.
    pub fn define_symbol(&mut self, name: &str, is_code: bool) -> Result<(), ModuleError> {
        if self.sealed {
            return Err(ModuleError::Sealed);
        }
        if self.symbols.contains_key(name) {
            return Err(ModuleError::DuplicateSymbol(name.to_string()));
        }
        self.symbols.insert(
            name.to_string(),
            Symbol {
                offset: self.current_offset(),
                is_code,
            },
        );
        Ok(())
    }

    /// Associate the current offset with a source line. Repeated calls
    /// at one offset keep the latest line.
    pub fn map_source_line(&mut self, line: u32) {
        let offset = self.current_offset();
        if let Some(last) = self.source_map.last_mut() {
            if last.code_offset == offset {
                last.source_line = line;
                return;
            }
        }
        self.source_map.push(SourceMapEntry {
            code_offset: offset,
            source_line: line,
        });
    }

    /// Attach a code generator comment to the current offset.
    pub fn add_comment(&mut self, text: &str) {
        self.comment_map.push(CommentEntry {
            code_offset: self.current_offset(),
            text: text.to_string(),
        });
    }

    /// Register an intra-module branch for the linker to patch in the
    /// staging buffer. Offsets are in instruction words.
    pub fn add_branch_fixup(&mut self, fixup: BranchFixup) {
        self.fixups.push(fixup);
    }

    /// Freeze the module; all further writes fail.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    /// Mutable staging buffer view for the linker's fixup pass.
    pub(crate) fn code_mut(&mut self) -> &mut [u8] {
        &mut self.code
    }

    pub fn labels(&self) -> &HashMap<u32, usize> {
        &self.labels
    }

    pub fn label_offset(&self, id: u32) -> Option<usize> {
        self.labels.get(&id).copied()
    }

    pub fn symbols(&self) -> &HashMap<String, Symbol> {
        &self.symbols
    }

    pub fn symbol(&self, name: &str) -> Option<Symbol> {
        self.symbols.get(name).copied()
    }

    pub fn ext_calls(&self) -> &[ExtCall] {
        &self.ext_calls
    }

    pub fn source_map(&self) -> &[SourceMapEntry] {
        &self.source_map
    }

    pub fn comment_map(&self) -> &[CommentEntry] {
        &self.comment_map
    }

    pub fn fixups(&self) -> &[BranchFixup] {
        &self.fixups
    }

    /// The source line covering a code offset: the entry with the
    /// largest offset not exceeding the query, or 0 before the first
    /// entry (and for an empty map).
    pub fn source_line_for(&self, offset: usize) -> u32 {
        match self
            .source_map
            .binary_search_by_key(&offset, |entry| entry.code_offset)
        {
            Ok(index) => self.source_map[index].source_line,
            Err(0) => 0,
            Err(index) => self.source_map[index - 1].source_line,
        }
    }

    /// Read back an instruction word.
    pub fn word_at(&self, offset: usize) -> u32 {
        u32::from_le_bytes(self.code[offset..offset + 4].try_into().unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{emit_nop, emit_ret};

    #[test]
    fn test_emit_keeps_alignment() {
        let mut module = JitModule::new();
        module.emit(emit_nop()).unwrap();
        module.emit(emit_ret()).unwrap();
        assert_eq!(module.code().len(), 8);
        assert_eq!(module.code().len() % 4, 0);
        assert_eq!(module.word_at(0), 0xD503201F);
        assert_eq!(module.word_at(4), 0xD65F03C0);
    }

    #[test]
    fn test_sealed_rejects_writes() {
        let mut module = JitModule::new();
        module.emit(emit_nop()).unwrap();
        module.seal();
        assert_eq!(module.emit(emit_nop()), Err(ModuleError::Sealed));
        assert_eq!(module.bind_label(0), Err(ModuleError::Sealed));
    }

    #[test]
    fn test_duplicate_label_and_symbol() {
        let mut module = JitModule::new();
        module.bind_label(7).unwrap();
        assert_eq!(module.bind_label(7), Err(ModuleError::DuplicateLabel(7)));
        module.define_symbol("MAIN", true).unwrap();
        assert_eq!(
            module.define_symbol("MAIN", true),
            Err(ModuleError::DuplicateSymbol("MAIN".to_string()))
        );
    }

    #[test]
    fn test_ext_call_records_offset() {
        let mut module = JitModule::new();
        module.emit(emit_nop()).unwrap();
        let offset = module.emit_ext_call("basic_print").unwrap();
        assert_eq!(offset, 4);
        assert_eq!(module.ext_calls().len(), 1);
        assert_eq!(module.ext_calls()[0].code_offset, 4);
        assert_eq!(module.ext_calls()[0].name(), "basic_print");
    }

    #[test]
    fn test_ext_name_inline_and_heap() {
        let short = ExtName::new("basic_rt_print");
        assert_eq!(short.as_str(), "basic_rt_print");
        let long_name = "a_rather_long_runtime_symbol_name_that_spills";
        let long = ExtName::new(long_name);
        assert_eq!(long.as_str(), long_name);
        assert_eq!(ExtName::new("x"), ExtName::new("x"));
    }

    #[test]
    fn test_source_line_lookup() {
        let mut module = JitModule::new();
        module.map_source_line(10);
        module.emit(emit_nop()).unwrap();
        module.emit(emit_nop()).unwrap();
        module.map_source_line(20);
        module.emit(emit_nop()).unwrap();

        assert_eq!(module.source_line_for(0), 10);
        assert_eq!(module.source_line_for(4), 10);
        assert_eq!(module.source_line_for(8), 20);
        assert_eq!(module.source_line_for(100), 20);

        let empty = JitModule::new();
        assert_eq!(empty.source_line_for(0), 0);
    }

    #[test]
    fn test_source_map_monotone() {
        let mut module = JitModule::new();
        module.map_source_line(1);
        module.map_source_line(2);
        module.emit(emit_nop()).unwrap();
        module.map_source_line(3);
        // Same-offset remap keeps the latest line and the map stays
        // strictly increasing in offset.
        assert_eq!(module.source_map().len(), 2);
        assert_eq!(module.source_map()[0].source_line, 2);
        assert!(module
            .source_map()
            .windows(2)
            .all(|w| w[0].code_offset < w[1].code_offset));
    }
}
