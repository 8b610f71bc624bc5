//! End-to-end: build a module the way the code generator does, link it
//! into an executable region, inspect the listing, and (on AArch64
//! hosts) run the result through a trampoline into native Rust.

use fasterbasic::disasm::Disassembler;
use fasterbasic::encoder::*;
use fasterbasic::jit::CodeRegion;
use fasterbasic::linker::{link, STUB_BR, STUB_LDR, STUB_SIZE};
use fasterbasic::module::JitModule;

// The runtime symbol the module calls out to.
extern "C" fn rt_add_one(x: i64) -> i64 {
    x + 1
}

fn build_module() -> JitModule {
    let mut module = JitModule::new();
    module.define_symbol("basic_main", true).unwrap();
    module.map_source_line(10);
    module.add_comment("prologue");
    module
        .emit(emit_stp_pre_64(Reg::FP, Reg::LR, Reg::SP, -16).unwrap())
        .unwrap();
    module.map_source_line(20);
    module.emit_all(&emit_load_immediate_64(Reg::X0, 41)).unwrap();
    module.emit_ext_call("rt_add_one").unwrap();
    module.bind_label(0).unwrap();
    module.map_source_line(30);
    module
        .emit(emit_ldp_post_64(Reg::FP, Reg::LR, Reg::SP, 16).unwrap())
        .unwrap();
    module.emit(emit_ret()).unwrap();
    module.seal();
    module
}

#[test]
fn test_link_into_region() {
    let module = build_module();
    let mut region = CodeRegion::allocate(module.code().len(), 1).unwrap();
    let result = {
        let mut link_region = region.link_region();
        link(
            &module,
            |name| (name == "rt_add_one").then_some(rt_add_one as usize as u64),
            &mut link_region,
        )
        .unwrap()
    };

    assert_eq!(result.trampoline_stubs.len(), 1);
    assert_eq!(result.trampoline_stubs[0].name, "rt_add_one");
    assert_eq!(
        result.trampoline_stubs[0].target_addr,
        rt_add_one as usize as u64
    );

    // The island carries the exact 16-byte stub layout.
    let bytes = region.bytes();
    let stub_base = (result.trampoline_base_addr - result.code_base_addr) as usize;
    let word = |at: usize| u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap());
    assert_eq!(word(stub_base), STUB_LDR);
    assert_eq!(word(stub_base + 4), STUB_BR);
    assert_eq!(
        u64::from_le_bytes(bytes[stub_base + 8..stub_base + 16].try_into().unwrap()),
        rt_add_one as usize as u64
    );
    assert_eq!(STUB_SIZE, 16);
}

#[test]
fn test_listing_of_linked_region() {
    let module = build_module();
    let mut region = CodeRegion::allocate(module.code().len(), 1).unwrap();
    let base = region.code_base_addr();
    let code_len = module.code().len();
    let result = {
        let mut link_region = region.link_region();
        link(
            &module,
            |_| Some(rt_add_one as usize as u64),
            &mut link_region,
        )
        .unwrap()
    };

    let disasm = Disassembler::new().unwrap();
    let listing = disasm
        .listing(&region.bytes()[..code_len], base, &module, Some(&result))
        .unwrap();
    assert!(listing.contains("basic_main:"), "{}", listing);
    assert!(listing.contains("; prologue"), "{}", listing);
    assert!(listing.contains("line 10"), "{}", listing);
    assert!(listing.contains("line 30"), "{}", listing);
    assert!(listing.contains(".L0:"), "{}", listing);
    // The BL is cross-checked against the trampoline index.
    assert!(listing.contains("rt_add_one"), "{}", listing);
    assert!(listing.contains("stub"), "{}", listing);

    let counts = disasm.classify(&region.bytes()[..code_len]).unwrap();
    assert_eq!(counts.total(), 5);
}

#[test]
fn test_two_externs_one_repeated() {
    // Two distinct symbols, one called twice: two stubs, and the
    // repeated calls land on the same one.
    let mut module = JitModule::new();
    module.emit_ext_call("extern_foo").unwrap();
    module.emit_ext_call("extern_foo").unwrap();
    module.emit_ext_call("extern_bar").unwrap();
    module.emit(emit_ret()).unwrap();
    module.seal();

    let mut region = CodeRegion::allocate(module.code().len(), 2).unwrap();
    let result = {
        let mut link_region = region.link_region();
        link(&module, |_| Some(0x7100_0000), &mut link_region).unwrap()
    };
    assert_eq!(result.trampoline_stubs.len(), 2);

    let bytes = region.bytes();
    let decode_target = |at: usize| {
        let word = u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap());
        let imm = ((word & 0x03FF_FFFF) << 6) as i32 >> 6;
        (result.code_base_addr + at as u64).wrapping_add((imm as i64 * 4) as u64)
    };
    let stub0 = result.trampoline_base_addr;
    let stub1 = result.trampoline_base_addr + STUB_SIZE as u64;
    assert_eq!(decode_target(0), stub0);
    assert_eq!(decode_target(4), stub0);
    assert_eq!(decode_target(8), stub1);
}

#[cfg(target_arch = "aarch64")]
#[test]
fn test_execute_through_trampoline() {
    let module = build_module();
    let mut region = CodeRegion::allocate(module.code().len(), 1).unwrap();
    {
        let mut link_region = region.link_region();
        link(
            &module,
            |name| (name == "rt_add_one").then_some(rt_add_one as usize as u64),
            &mut link_region,
        )
        .unwrap();
    }
    region.flush_icache();

    let entry = module.symbol("basic_main").unwrap().offset;
    let result = unsafe { (region.entry(entry))() };
    assert_eq!(result, 42);
}
