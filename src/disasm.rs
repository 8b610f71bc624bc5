//! Annotated disassembly of a module's code, staged or linked.
//!
//! The listing leans on capstone as the decoding ground truth and
//! interleaves the module's side tables: symbols and block labels on
//! their own lines, code generator comments, source-line references,
//! and external-call targets. For a linked buffer the BL targets are
//! additionally cross-checked against the trampoline island.

use std::collections::HashMap;
use std::fmt::Write as _;

use capstone::prelude::*;
use thiserror::Error;

use crate::linker::LinkResult;
use crate::module::JitModule;

#[derive(Debug, Error)]
pub enum DisasmError {
    #[error("capstone: {0}")]
    Capstone(#[from] capstone::Error),
}

/// Instruction category for frequency analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InsnClass {
    Arithmetic,
    Memory,
    Branch,
    MoveImm,
    Compare,
    Float,
    Simd,
    System,
    Other,
}

impl InsnClass {
    pub const ALL: [InsnClass; 9] = [
        InsnClass::Arithmetic,
        InsnClass::Memory,
        InsnClass::Branch,
        InsnClass::MoveImm,
        InsnClass::Compare,
        InsnClass::Float,
        InsnClass::Simd,
        InsnClass::System,
        InsnClass::Other,
    ];

    pub fn name(self) -> &'static str {
        match self {
            InsnClass::Arithmetic => "arithmetic",
            InsnClass::Memory => "memory",
            InsnClass::Branch => "branch",
            InsnClass::MoveImm => "move/imm",
            InsnClass::Compare => "compare",
            InsnClass::Float => "float",
            InsnClass::Simd => "simd",
            InsnClass::System => "system",
            InsnClass::Other => "other",
        }
    }
}

/// Place a mnemonic into exactly one category by prefix.
pub fn classify_mnemonic(mnemonic: &str) -> InsnClass {
    let m = mnemonic.to_ascii_lowercase();
    let starts = |prefixes: &[&str]| prefixes.iter().any(|p| m.starts_with(p));

    if m == "b" || m == "bl" || m == "br" || m == "blr" || m == "ret"
        || starts(&["b.", "cbz", "cbnz", "tbz", "tbnz"])
    {
        InsnClass::Branch
    } else if starts(&["cmp", "cmn", "tst", "ccmp", "ccmn", "fcmp"]) {
        InsnClass::Compare
    } else if starts(&["mov", "mvn", "adr"]) {
        InsnClass::MoveImm
    } else if starts(&[
        "ldr", "ldu", "ldp", "ldar", "ldax", "ldx", "ld1", "str", "stu", "stp", "stlr", "stlx",
        "stx", "st1",
    ]) {
        InsnClass::Memory
    } else if starts(&["nop", "yield", "brk", "dmb", "dsb", "isb", "mrs", "msr", "hint", "sev", "wfe", "wfi"]) {
        InsnClass::System
    } else if starts(&["aes", "sha"]) || starts(&[
        "dup", "ins", "smov", "umov", "xtn", "sqxtn", "uqxtn", "zip", "uzp", "trn", "addv",
        "saddlv", "uaddlv", "smaxv", "sminv", "umaxv", "uminv", "addp", "shl", "sshr", "ushr",
        "sshll", "ushll", "sxtl", "uxtl", "cmeq", "cmgt", "cmge", "cmhi", "cmhs", "cmtst", "cmlt",
        "cmle", "bsl", "bit", "bif", "tbl", "tbx",
    ]) {
        InsnClass::Simd
    } else if starts(&["f", "scvtf", "ucvtf"]) {
        InsnClass::Float
    } else if starts(&[
        "add", "sub", "mul", "madd", "msub", "smaddl", "smsubl", "umaddl", "umsubl", "smulh",
        "umulh", "smull", "umull", "sdiv", "udiv", "neg", "ngc", "and", "orr", "orn", "eor",
        "eon", "bic", "lsl", "lsr", "asr", "ror", "extr", "sxt", "uxt", "sbfm", "ubfm", "bfm",
        "sbfx", "ubfx", "sbfiz", "ubfiz", "bfi", "bfxil", "csel", "csinc", "csinv", "csneg",
        "cset", "cinc", "cinv", "cneg", "clz", "cls", "rbit", "rev", "adc", "sbc", "sq", "uq",
        "smax", "smin", "umax", "umin",
    ]) {
        InsnClass::Arithmetic
    } else {
        InsnClass::Other
    }
}

/// Category histogram with half-up rounded percentages.
#[derive(Debug, Default, Clone)]
pub struct ClassCounts {
    counts: HashMap<InsnClass, usize>,
    total: usize,
}

impl ClassCounts {
    pub fn record(&mut self, class: InsnClass) {
        *self.counts.entry(class).or_insert(0) += 1;
        self.total += 1;
    }

    pub fn count(&self, class: InsnClass) -> usize {
        self.counts.get(&class).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Percentage of the total, rounded half-up.
    pub fn percent(&self, class: InsnClass) -> usize {
        if self.total == 0 {
            return 0;
        }
        (self.count(class) * 100 + self.total / 2) / self.total
    }

    pub fn report(&self) -> String {
        let mut out = String::new();
        for class in InsnClass::ALL {
            let count = self.count(class);
            if count > 0 {
                let _ = writeln!(
                    out,
                    "{:<12} {:>6}  {:>3}%",
                    class.name(),
                    count,
                    self.percent(class)
                );
            }
        }
        let _ = writeln!(out, "{:<12} {:>6}", "total", self.total);
        out
    }
}

/// Capstone-backed AArch64 disassembler.
pub struct Disassembler {
    cs: Capstone,
}

impl Disassembler {
    pub fn new() -> Result<Disassembler, DisasmError> {
        let mut cs = Capstone::new()
            .arm64()
            .mode(arch::arm64::ArchMode::Arm)
            .build()?;
        // Inline constants (e.g. trampoline target words) must not stop
        // the decode loop.
        cs.set_skipdata(true)?;
        Ok(Disassembler { cs })
    }

    /// Render the module's staging buffer at address 0.
    pub fn listing_staging(&self, module: &JitModule) -> Result<String, DisasmError> {
        self.listing(module.code(), 0, module, None)
    }

    /// Render `code` mapped at `base_addr`, annotated from the module
    /// side tables and, when linked, the trampoline index.
    pub fn listing(
        &self,
        code: &[u8],
        base_addr: u64,
        module: &JitModule,
        link: Option<&LinkResult>,
    ) -> Result<String, DisasmError> {
        // Offset-keyed views of the side tables.
        let mut symbols_at: HashMap<usize, Vec<&str>> = HashMap::new();
        for (name, symbol) in module.symbols() {
            symbols_at.entry(symbol.offset).or_default().push(name);
        }
        for names in symbols_at.values_mut() {
            names.sort_unstable();
        }
        let mut labels_at: HashMap<usize, Vec<u32>> = HashMap::new();
        for (&id, &offset) in module.labels() {
            labels_at.entry(offset).or_default().push(id);
        }
        for ids in labels_at.values_mut() {
            ids.sort_unstable();
        }
        let ext_at: HashMap<usize, &str> = module
            .ext_calls()
            .iter()
            .map(|call| (call.code_offset, call.name()))
            .collect();

        let mut comments = module.comment_map().iter().peekable();
        let mut sources = module.source_map().iter().peekable();

        let mut out = String::new();
        let insns = self.cs.disasm_all(code, base_addr)?;
        for insn in insns.iter() {
            let offset = (insn.address() - base_addr) as usize;

            while let Some(comment) = comments.peek() {
                if comment.code_offset > offset {
                    break;
                }
                let _ = writeln!(out, "  ; {}", comment.text);
                comments.next();
            }
            if let Some(names) = symbols_at.get(&offset) {
                for name in names {
                    let _ = writeln!(out, "{}:", name);
                }
            }
            if let Some(ids) = labels_at.get(&offset) {
                for id in ids {
                    let _ = writeln!(out, ".L{}:", id);
                }
            }

            let word = raw_word(insn.bytes());
            let mnemonic = insn.mnemonic().unwrap_or("??");
            let op_str = insn.op_str().unwrap_or("");
            let mut line = format!(
                "  {:#012x}:  {}  {:<8} {}",
                insn.address(),
                word,
                mnemonic,
                op_str
            );

            let mut annotations: Vec<String> = Vec::new();
            if let Some(name) = ext_at.get(&offset) {
                annotations.push(format!("-> {}", name));
            }
            if let (Some(result), Some(target)) = (link, bl_target(insn.bytes(), insn.address())) {
                if let Some(stub) = result.stub_at_addr(target) {
                    annotations.push(format!("-> {} (stub {:#x})", stub.name, target));
                }
            }
            while let Some(entry) = sources.peek() {
                if entry.code_offset > offset {
                    break;
                }
                if entry.code_offset == offset {
                    annotations.push(format!("line {}", entry.source_line));
                }
                sources.next();
            }

            if !annotations.is_empty() {
                let _ = write!(line, "    ; {}", annotations.join("; "));
            }
            let _ = writeln!(out, "{}", line.trim_end());
        }
        Ok(out)
    }

    /// Classify every instruction in `code` by mnemonic prefix.
    pub fn classify(&self, code: &[u8]) -> Result<ClassCounts, DisasmError> {
        let mut counts = ClassCounts::default();
        let insns = self.cs.disasm_all(code, 0)?;
        for insn in insns.iter() {
            counts.record(classify_mnemonic(insn.mnemonic().unwrap_or("")));
        }
        Ok(counts)
    }
}

fn raw_word(bytes: &[u8]) -> String {
    if bytes.len() == 4 {
        format!("{:08x}", u32::from_le_bytes(bytes.try_into().unwrap()))
    } else {
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

// Decode a BL's absolute target, if the word is a BL.
fn bl_target(bytes: &[u8], address: u64) -> Option<u64> {
    if bytes.len() != 4 {
        return None;
    }
    let word = u32::from_le_bytes(bytes.try_into().unwrap());
    if word & 0xFC00_0000 != 0x9400_0000 {
        return None;
    }
    let imm = ((word & 0x03FF_FFFF) << 6) as i32 >> 6;
    Some(address.wrapping_add((imm as i64 * 4) as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{emit_mov_register_64, emit_nop, emit_ret, Reg};
    use crate::linker::{link, LinkRegion};

    #[test]
    fn test_classify_mnemonics() {
        assert_eq!(classify_mnemonic("add"), InsnClass::Arithmetic);
        assert_eq!(classify_mnemonic("ldr"), InsnClass::Memory);
        assert_eq!(classify_mnemonic("b.eq"), InsnClass::Branch);
        assert_eq!(classify_mnemonic("bl"), InsnClass::Branch);
        assert_eq!(classify_mnemonic("movz"), InsnClass::MoveImm);
        assert_eq!(classify_mnemonic("cmp"), InsnClass::Compare);
        assert_eq!(classify_mnemonic("fadd"), InsnClass::Float);
        assert_eq!(classify_mnemonic("zip1"), InsnClass::Simd);
        assert_eq!(classify_mnemonic("nop"), InsnClass::System);
        assert_eq!(classify_mnemonic("udf"), InsnClass::Other);
    }

    #[test]
    fn test_percent_rounds_half_up() {
        let mut counts = ClassCounts::default();
        counts.record(InsnClass::Branch);
        counts.record(InsnClass::Arithmetic);
        counts.record(InsnClass::Arithmetic);
        // 1/3 rounds to 33, 2/3 rounds to 67.
        assert_eq!(counts.percent(InsnClass::Branch), 33);
        assert_eq!(counts.percent(InsnClass::Arithmetic), 67);
    }

    #[test]
    fn test_listing_annotations() {
        let mut module = JitModule::new();
        module.define_symbol("basic_main", true).unwrap();
        module.add_comment("prologue");
        module.map_source_line(10);
        module.emit(emit_nop()).unwrap();
        module.bind_label(0).unwrap();
        module.emit(emit_mov_register_64(Reg::X0, Reg::X1)).unwrap();
        module.emit_ext_call("basic_print").unwrap();
        module.emit(emit_ret()).unwrap();
        module.seal();

        let disasm = Disassembler::new().unwrap();
        let listing = disasm.listing_staging(&module).unwrap();

        assert!(listing.contains("basic_main:"), "{}", listing);
        assert!(listing.contains("; prologue"), "{}", listing);
        assert!(listing.contains(".L0:"), "{}", listing);
        assert!(listing.contains("line 10"), "{}", listing);
        assert!(listing.contains("-> basic_print"), "{}", listing);
        assert!(listing.contains("nop"), "{}", listing);
        assert!(listing.contains("ret"), "{}", listing);
    }

    #[test]
    fn test_linked_bl_cross_check() {
        let mut module = JitModule::new();
        module.emit_ext_call("extern_foo").unwrap();
        module.emit(emit_ret()).unwrap();
        module.seal();

        let mut code = vec![0u8; module.code().len()];
        let mut tramps = vec![0u8; 16];
        let base = 0x10_0000u64;
        let result = {
            let mut region = LinkRegion {
                code: &mut code,
                trampolines: &mut tramps,
                code_base_addr: base,
                trampoline_base_addr: base + 0x100,
            };
            link(&module, |_| Some(0x7000_0000), &mut region).unwrap()
        };

        let disasm = Disassembler::new().unwrap();
        let listing = disasm.listing(&code, base, &module, Some(&result)).unwrap();
        assert!(listing.contains("stub"), "{}", listing);
        assert!(listing.contains("extern_foo"), "{}", listing);
    }

    #[test]
    fn test_classify_module() {
        let mut module = JitModule::new();
        module.emit(emit_nop()).unwrap();
        module.emit(emit_mov_register_64(Reg::X0, Reg::X1)).unwrap();
        module.emit(emit_ret()).unwrap();
        module.seal();

        let disasm = Disassembler::new().unwrap();
        let counts = disasm.classify(module.code()).unwrap();
        assert_eq!(counts.total(), 3);
        assert_eq!(counts.count(InsnClass::System), 1);
        assert_eq!(counts.count(InsnClass::Branch), 1);
        // MOV of a register decodes as mov, classified move/imm.
        assert_eq!(counts.count(InsnClass::MoveImm), 1);
    }
}
