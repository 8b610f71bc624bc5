//! The module linker: places code and a trampoline island into the
//! final executable region, resolves external symbols through 16-byte
//! stubs, and patches every branch to its final displacement.
//!
//! The linker never flushes instruction caches or changes page
//! protections; the caller owns the writable -> executable transition
//! and must perform the architectural cache maintenance sequence
//! before branching into the region.

use std::collections::HashMap;

use thiserror::Error;

use crate::module::JitModule;

/// Size of one trampoline stub: two instructions plus the 8-byte
/// absolute target address.
pub const STUB_SIZE: usize = 16;

/// `LDR X16, [PC, #8]`: loads the stub's embedded target address.
pub const STUB_LDR: u32 = 0x5800_0050;

/// `BR X16`.
pub const STUB_BR: u32 = 0xD61F_0200;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LinkError {
    #[error("unresolved external symbol: {0}")]
    UnresolvedSymbol(String),
    #[error("branch displacement out of range at code offset {0:#x}")]
    OutOfRange(usize),
    #[error("link region too small: need {needed} bytes, have {available}")]
    RegionTooSmall { needed: usize, available: usize },
}

/// The caller-provided destination: two writable subregions of one
/// executable mapping, with their final virtual addresses.
pub struct LinkRegion<'a> {
    pub code: &'a mut [u8],
    pub trampolines: &'a mut [u8],
    pub code_base_addr: u64,
    pub trampoline_base_addr: u64,
}

/// One placed trampoline stub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrampolineStub {
    /// Byte offset of the stub within the trampoline island.
    pub stub_offset: usize,
    pub name: String,
    /// Resolved absolute address the stub branches to.
    pub target_addr: u64,
}

/// Placement record produced by a successful link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkResult {
    pub trampoline_stubs: Vec<TrampolineStub>,
    pub code_base_addr: u64,
    pub trampoline_base_addr: u64,
}

impl LinkResult {
    /// Reverse-map an absolute address to the stub it begins, if any.
    /// The disassembler uses this to annotate linked BL targets.
    pub fn stub_at_addr(&self, addr: u64) -> Option<&TrampolineStub> {
        if addr < self.trampoline_base_addr {
            return None;
        }
        let offset = (addr - self.trampoline_base_addr) as usize;
        if offset % STUB_SIZE != 0 {
            return None;
        }
        self.trampoline_stubs.get(offset / STUB_SIZE)
    }
}

/// Link a sealed module into `region`, resolving externs via
/// `resolver`. The module itself is not modified; remaining
/// intra-module fixups are applied to the copied code.
pub fn link(
    module: &JitModule,
    resolver: impl Fn(&str) -> Option<u64>,
    region: &mut LinkRegion<'_>,
) -> Result<LinkResult, LinkError> {
    // One stub per unique name, indexed in first-occurrence order.
    let mut stub_index: HashMap<&str, usize> = HashMap::new();
    let mut stub_names: Vec<&str> = Vec::new();
    for call in module.ext_calls() {
        stub_index.entry(call.name()).or_insert_with(|| {
            stub_names.push(call.name());
            stub_names.len() - 1
        });
    }

    let code_len = module.code().len();
    let stubs_len = stub_names.len() * STUB_SIZE;
    if region.code.len() < code_len {
        return Err(LinkError::RegionTooSmall {
            needed: code_len,
            available: region.code.len(),
        });
    }
    if region.trampolines.len() < stubs_len {
        return Err(LinkError::RegionTooSmall {
            needed: stubs_len,
            available: region.trampolines.len(),
        });
    }

    let code = &mut region.code[..code_len];
    code.copy_from_slice(module.code());

    // Late intra-module branches resolve against the copied buffer.
    for fixup in module.fixups() {
        if !fixup.resolve(code) {
            return Err(LinkError::OutOfRange(fixup.instruction_offset * 4));
        }
    }

    // Resolve every unique extern and lay its stub down.
    let mut stubs = Vec::with_capacity(stub_names.len());
    for (index, name) in stub_names.iter().enumerate() {
        let target = resolver(name).ok_or_else(|| LinkError::UnresolvedSymbol(name.to_string()))?;
        let at = index * STUB_SIZE;
        region.trampolines[at..at + 4].copy_from_slice(&STUB_LDR.to_le_bytes());
        region.trampolines[at + 4..at + 8].copy_from_slice(&STUB_BR.to_le_bytes());
        region.trampolines[at + 8..at + 16].copy_from_slice(&target.to_le_bytes());
        stubs.push(TrampolineStub {
            stub_offset: at,
            name: name.to_string(),
            target_addr: target,
        });
    }

    // Point every external BL at its stub.
    for call in module.ext_calls() {
        let index = stub_index[call.name()];
        let bl_addr = region.code_base_addr + call.code_offset as u64;
        let stub_addr = region.trampoline_base_addr + (index * STUB_SIZE) as u64;
        let delta = stub_addr.wrapping_sub(bl_addr) as i64;
        debug_assert_eq!(delta % 4, 0);
        let words = delta / 4;
        if !(-(1 << 25)..(1 << 25)).contains(&words) {
            return Err(LinkError::OutOfRange(call.code_offset));
        }
        let at = call.code_offset;
        let existing = u32::from_le_bytes(code[at..at + 4].try_into().unwrap());
        let patched = (existing & 0xFC00_0000) | (words as u32 & 0x03FF_FFFF);
        code[at..at + 4].copy_from_slice(&patched.to_le_bytes());
    }

    Ok(LinkResult {
        trampoline_stubs: stubs,
        code_base_addr: region.code_base_addr,
        trampoline_base_addr: region.trampoline_base_addr,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{emit_nop, emit_ret, BranchClass, BranchFixup};

    fn resolver(name: &str) -> Option<u64> {
        match name {
            "extern_foo" => Some(0x7000_0000),
            "extern_bar" => Some(0x7000_1000),
            _ => None,
        }
    }

    fn link_module(module: &JitModule) -> Result<(Vec<u8>, Vec<u8>, LinkResult), LinkError> {
        let mut code = vec![0u8; module.code().len()];
        let mut tramps = vec![0u8; 16 * 8];
        let code_base = 0x1_0000_0000u64;
        let result = {
            let mut region = LinkRegion {
                code: &mut code,
                trampolines: &mut tramps,
                code_base_addr: code_base,
                trampoline_base_addr: code_base + 0x1000,
            };
            link(module, resolver, &mut region)?
        };
        Ok((code, tramps, result))
    }

    fn word(buf: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap())
    }

    #[test]
    fn test_dedup_and_displacements() {
        let mut module = JitModule::new();
        module.emit_ext_call("extern_foo").unwrap();
        module.emit(emit_nop()).unwrap();
        module.emit_ext_call("extern_foo").unwrap();
        module.emit_ext_call("extern_bar").unwrap();
        module.emit(emit_ret()).unwrap();
        module.seal();

        let (code, tramps, result) = link_module(&module).unwrap();

        // Two unique names, two stubs, in first-occurrence order.
        assert_eq!(result.trampoline_stubs.len(), 2);
        assert_eq!(result.trampoline_stubs[0].name, "extern_foo");
        assert_eq!(result.trampoline_stubs[1].name, "extern_bar");
        assert_eq!(result.trampoline_stubs[0].target_addr, 0x7000_0000);

        // Both foo calls reach the same stub; their displacement
        // fields differ by exactly the word distance between the BLs.
        let bl0 = word(&code, 0);
        let bl8 = word(&code, 8);
        let bl12 = word(&code, 12);
        let disp0 = bl0 & 0x03FF_FFFF;
        let disp8 = bl8 & 0x03FF_FFFF;
        let disp12 = bl12 & 0x03FF_FFFF;
        assert_eq!(disp0, disp8 + 2);
        assert_ne!(disp8, disp12);

        // Displacement decodes to the stub address.
        let target0 = 0x1_0000_0000u64 + (disp0 as u64) * 4;
        assert_eq!(target0, result.trampoline_base_addr);

        // Stub layout is bit-exact.
        assert_eq!(word(&tramps, 0), STUB_LDR);
        assert_eq!(word(&tramps, 4), STUB_BR);
        assert_eq!(
            u64::from_le_bytes(tramps[8..16].try_into().unwrap()),
            0x7000_0000
        );
        assert_eq!(word(&tramps, 16), STUB_LDR);
    }

    #[test]
    fn test_unresolved_symbol() {
        let mut module = JitModule::new();
        module.emit_ext_call("extern_missing").unwrap();
        module.seal();
        assert_eq!(
            link_module(&module).unwrap_err(),
            LinkError::UnresolvedSymbol("extern_missing".to_string())
        );
    }

    #[test]
    fn test_out_of_range_trampoline() {
        let mut module = JitModule::new();
        module.emit_ext_call("extern_foo").unwrap();
        module.seal();

        let mut code = vec![0u8; 4];
        let mut tramps = vec![0u8; 16];
        let mut region = LinkRegion {
            code: &mut code,
            trampolines: &mut tramps,
            code_base_addr: 0,
            // Past the 26-bit signed word displacement window.
            trampoline_base_addr: 0x1000_0000_0000,
        };
        assert_eq!(
            link(&module, resolver, &mut region).unwrap_err(),
            LinkError::OutOfRange(0)
        );
    }

    #[test]
    fn test_region_too_small() {
        let mut module = JitModule::new();
        module.emit_ext_call("extern_foo").unwrap();
        module.seal();

        let mut code = vec![0u8; 4];
        let mut tramps = vec![0u8; 8];
        let mut region = LinkRegion {
            code: &mut code,
            trampolines: &mut tramps,
            code_base_addr: 0,
            trampoline_base_addr: 0x1000,
        };
        assert!(matches!(
            link(&module, resolver, &mut region),
            Err(LinkError::RegionTooSmall { .. })
        ));
    }

    #[test]
    fn test_staging_fixups_apply_to_copy() {
        let mut module = JitModule::new();
        // B placeholder at word 0, target bound later at word 2.
        module.emit(0x1400_0000).unwrap();
        module.emit(emit_nop()).unwrap();
        module.emit(emit_ret()).unwrap();
        module.add_branch_fixup(BranchFixup {
            instruction_offset: 0,
            target_offset: 2,
            class: BranchClass::Imm26,
        });
        module.seal();

        let (code, _, _) = link_module(&module).unwrap();
        assert_eq!(word(&code, 0), 0x1400_0002);
        // The staging buffer is untouched.
        assert_eq!(module.word_at(0), 0x1400_0000);
    }

    #[test]
    fn test_stub_at_addr() {
        let mut module = JitModule::new();
        module.emit_ext_call("extern_foo").unwrap();
        module.emit_ext_call("extern_bar").unwrap();
        module.seal();
        let (_, _, result) = link_module(&module).unwrap();

        let base = result.trampoline_base_addr;
        assert_eq!(result.stub_at_addr(base).unwrap().name, "extern_foo");
        assert_eq!(
            result.stub_at_addr(base + 16).unwrap().name,
            "extern_bar"
        );
        assert!(result.stub_at_addr(base + 8).is_none());
        assert!(result.stub_at_addr(base.wrapping_sub(16)).is_none());
    }
}
