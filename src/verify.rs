//! Encoder verification: a table of known-good encodings with their
//! canonical assembly text, checked two ways. The static check
//! compares each encoder call against the recorded word; the
//! round-trip harness feeds the textual forms to a system assembler,
//! extracts the assembled words, and compares those against the
//! encoder output. Every encoder operation family has entries here.

use std::fs;
use std::path::PathBuf;
use std::process::Command;

use thiserror::Error;

use crate::encoder::*;

/// One verification triple: the encoder's output, the word it must
/// equal, and the canonical assembly text. An empty text skips the
/// assembler pass (forms the assembler only accepts as labels).
#[derive(Debug, Clone)]
pub struct VerifyCase {
    pub encoded: u32,
    pub expected: u32,
    pub text: &'static str,
}

/// A failed comparison.
#[derive(Debug, Clone)]
pub struct Mismatch {
    pub index: usize,
    pub text: String,
    pub expected: u32,
    pub actual: u32,
}

macro_rules! case {
    ($table:ident, $encoded:expr, $expected:expr, $text:expr) => {
        $table.push(VerifyCase {
            encoded: $encoded,
            expected: $expected,
            text: $text,
        })
    };
}

/// Build the full verification table.
pub fn build_cases() -> Vec<VerifyCase> {
    use Arrangement as A;
    use Reg::*;
    use VReg::*;

    let mut t = Vec::new();

    // Branches
    case!(t, emit_b(1).unwrap(), 0x14000001, "b #4");
    case!(t, emit_b(-1).unwrap(), 0x17FFFFFF, "b #-4");
    case!(t, emit_bl(0).unwrap(), 0x94000000, "bl #0");
    case!(t, emit_b_cond(Cond::Eq, 2).unwrap(), 0x54000040, "b.eq #8");
    case!(t, emit_b_cond(Cond::Lt, -2).unwrap(), 0x54FFFFCB, "b.lt #-8");
    case!(t, emit_cbz_64(X0, 2).unwrap(), 0xB4000040, "cbz x0, #8");
    case!(t, emit_cbz_32(X3, 1).unwrap(), 0x34000023, "cbz w3, #4");
    case!(t, emit_cbnz_64(X9, 2).unwrap(), 0xB5000049, "cbnz x9, #8");
    case!(t, emit_cbnz_32(X1, -1).unwrap(), 0x35FFFFE1, "cbnz w1, #-4");
    case!(t, emit_tbz(X0, 33, 1).unwrap(), 0xB6080020, "tbz x0, #33, #4");
    case!(t, emit_tbnz(X2, 0, 4).unwrap(), 0x37000082, "tbnz x2, #0, #16");
    case!(t, emit_br(X16), 0xD61F0200, "br x16");
    case!(t, emit_blr(X8), 0xD63F0100, "blr x8");
    case!(t, emit_ret(), 0xD65F03C0, "ret");
    case!(t, emit_ret_reg(X1), 0xD65F0020, "ret x1");

    // Arithmetic, register
    case!(t, emit_add_register_64(X0, X1, reg_only(X2)), 0x8B020020, "add x0, x1, x2");
    case!(t, emit_add_register_32(X1, X2, reg_only(X3)), 0x0B030041, "add w1, w2, w3");
    case!(t, emit_adds_register_64(X0, X1, reg_only(X2)), 0xAB020020, "adds x0, x1, x2");
    case!(t, emit_sub_register_64(X4, X5, reg_only(X6)), 0xCB0600A4, "sub x4, x5, x6");
    case!(t, emit_subs_register_64(X0, X1, reg_only(X2)), 0xEB020020, "subs x0, x1, x2");
    case!(
        t,
        emit_add_register_64(X0, X1, reg_shifted(X2, Shift::Lsl, 4)),
        0x8B021020,
        "add x0, x1, x2, lsl #4"
    );
    case!(
        t,
        emit_sub_register_64(X0, X1, reg_shifted(X2, Shift::Asr, 2)),
        0xCB820820,
        "sub x0, x1, x2, asr #2"
    );
    case!(
        t,
        emit_add_register_64(X0, X1, reg_extended(X2, Extend::Uxtw, 0)),
        0x8B224020,
        "add x0, x1, w2, uxtw"
    );
    case!(t, emit_cmp_register_64(X0, reg_only(X1)), 0xEB01001F, "cmp x0, x1");
    case!(t, emit_neg_64(X0, reg_only(X1)), 0xCB0103E0, "neg x0, x1");

    // Logical, register
    case!(t, emit_and_register_64(X0, X1, reg_only(X2)), 0x8A020020, "and x0, x1, x2");
    case!(t, emit_and_register_32(X0, X1, reg_only(X2)), 0x0A020020, "and w0, w1, w2");
    case!(t, emit_ands_register_64(X0, X1, reg_only(X2)), 0xEA020020, "ands x0, x1, x2");
    case!(t, emit_orr_register_64(X0, X1, reg_only(X2)), 0xAA020020, "orr x0, x1, x2");
    case!(t, emit_eor_register_64(X0, X1, reg_only(X2)), 0xCA020020, "eor x0, x1, x2");
    case!(t, emit_bic_register_64(X0, X1, reg_only(X2)), 0x8A220020, "bic x0, x1, x2");
    case!(t, emit_bics_register_64(X0, X1, reg_only(X2)), 0xEA220020, "bics x0, x1, x2");
    case!(t, emit_orn_register_64(X0, X1, reg_only(X2)), 0xAA220020, "orn x0, x1, x2");
    case!(t, emit_eon_register_64(X0, X1, reg_only(X2)), 0xCA220020, "eon x0, x1, x2");
    case!(t, emit_mov_register_64(X0, X1), 0xAA0103E0, "mov x0, x1");
    case!(t, emit_mvn_64(X0, reg_only(X1)), 0xAA2103E0, "mvn x0, x1");
    case!(t, emit_tst_register_64(X0, reg_only(X1)), 0xEA01001F, "tst x0, x1");

    // Variable shifts
    case!(t, emit_lsl_register_64(X0, X1, X2), 0x9AC22020, "lsl x0, x1, x2");
    case!(t, emit_lsr_register_64(X0, X1, X2), 0x9AC22420, "lsr x0, x1, x2");
    case!(t, emit_asr_register_64(X0, X1, X2), 0x9AC22820, "asr x0, x1, x2");
    case!(t, emit_ror_register_64(X0, X1, X2), 0x9AC22C20, "ror x0, x1, x2");
    case!(t, emit_lsl_register_32(X0, X1, X2), 0x1AC22020, "lsl w0, w1, w2");

    // Multiply / divide
    case!(t, emit_madd_64(X0, X1, X2, X3), 0x9B020C20, "madd x0, x1, x2, x3");
    case!(t, emit_msub_64(X0, X1, X2, X3), 0x9B028C20, "msub x0, x1, x2, x3");
    case!(t, emit_smaddl(X0, X1, X2, X3), 0x9B220C20, "smaddl x0, w1, w2, x3");
    case!(t, emit_smsubl(X0, X1, X2, X3), 0x9B228C20, "smsubl x0, w1, w2, x3");
    case!(t, emit_umaddl(X0, X1, X2, X3), 0x9BA20C20, "umaddl x0, w1, w2, x3");
    case!(t, emit_umsubl(X0, X1, X2, X3), 0x9BA28C20, "umsubl x0, w1, w2, x3");
    case!(t, emit_mul_64(X0, X1, X2), 0x9B027C20, "mul x0, x1, x2");
    case!(t, emit_smulh(X0, X1, X2), 0x9B427C20, "smulh x0, x1, x2");
    case!(t, emit_umulh(X0, X1, X2), 0x9BC27C20, "umulh x0, x1, x2");
    case!(t, emit_sdiv_64(X0, X1, X2), 0x9AC20C20, "sdiv x0, x1, x2");
    case!(t, emit_udiv_64(X0, X1, X2), 0x9AC20820, "udiv x0, x1, x2");
    case!(t, emit_sdiv_32(X0, X1, X2), 0x1AC20C20, "sdiv w0, w1, w2");

    // Arithmetic, immediate
    case!(t, emit_add_imm_64(X0, X1, 42).unwrap(), 0x9100A820, "add x0, x1, #42");
    case!(
        t,
        emit_add_imm_64(X0, X1, 4096).unwrap(),
        0x91400420,
        "add x0, x1, #1, lsl #12"
    );
    case!(t, emit_sub_imm_64(X0, X1, 42).unwrap(), 0xD100A820, "sub x0, x1, #42");
    case!(t, emit_adds_imm_64(X0, X1, 1).unwrap(), 0xB1000420, "adds x0, x1, #1");
    case!(t, emit_subs_imm_64(X0, X1, 1).unwrap(), 0xF1000420, "subs x0, x1, #1");
    case!(t, emit_cmp_imm_64(X0, 0).unwrap(), 0xF100001F, "cmp x0, #0");
    case!(t, emit_add_imm_32(X0, X1, 7).unwrap(), 0x11001C20, "add w0, w1, #7");

    // Logical, immediate
    case!(t, emit_and_imm_64(X0, X1, 0xFF).unwrap(), 0x92401C20, "and x0, x1, #0xff");
    case!(t, emit_and_imm_32(X0, X1, 0xFF).unwrap(), 0x12001C20, "and w0, w1, #0xff");
    case!(t, emit_orr_imm_64(X0, Reg::ZR, 0xFF).unwrap(), 0xB2401FE0, "orr x0, xzr, #0xff");
    case!(t, emit_eor_imm_64(X0, X1, 0xFF).unwrap(), 0xD2401C20, "eor x0, x1, #0xff");
    case!(t, emit_ands_imm_64(X0, X1, 0xFF).unwrap(), 0xF2401C20, "ands x0, x1, #0xff");

    // Move wide
    case!(t, emit_movz_64(X0, 0, 0), 0xD2800000, "movz x0, #0");
    case!(t, emit_movz_64(X0, 42, 0), 0xD2800540, "movz x0, #42");
    case!(t, emit_movz_32(X0, 7, 0), 0x528000E0, "movz w0, #7");
    case!(t, emit_movn_64(X0, 0, 0), 0x92800000, "movn x0, #0");
    case!(t, emit_movk_64(X0, 1, 1), 0xF2A00020, "movk x0, #1, lsl #16");

    // Conditional select family
    case!(t, emit_csel_64(X0, X1, X2, Cond::Eq), 0x9A820020, "csel x0, x1, x2, eq");
    case!(t, emit_csinc_64(X0, X1, X2, Cond::Ne), 0x9A821420, "csinc x0, x1, x2, ne");
    case!(t, emit_csinv_64(X0, X1, X2, Cond::Ge), 0xDA82A020, "csinv x0, x1, x2, ge");
    case!(t, emit_csneg_64(X0, X1, X2, Cond::Lt), 0xDA82B420, "csneg x0, x1, x2, lt");
    case!(t, emit_cset_64(X0, Cond::Eq), 0x9A9F17E0, "cset x0, eq");
    case!(t, emit_csetm_64(X0, Cond::Ne), 0xDA9F03E0, "csetm x0, ne");
    case!(t, emit_cinc_64(X0, X1, Cond::Eq), 0x9A811420, "cinc x0, x1, eq");
    case!(t, emit_cinv_64(X0, X1, Cond::Eq), 0xDA811020, "cinv x0, x1, eq");
    case!(t, emit_cneg_64(X0, X1, Cond::Eq), 0xDA811420, "cneg x0, x1, eq");

    // Bitfield
    case!(t, emit_ubfx_64(X0, X1, 8, 8), 0xD3483C20, "ubfx x0, x1, #8, #8");
    case!(t, emit_sbfx_64(X0, X1, 8, 8), 0x93483C20, "sbfx x0, x1, #8, #8");
    case!(t, emit_bfi_64(X0, X1, 8, 8), 0xB3781C20, "bfi x0, x1, #8, #8");
    case!(t, emit_bfxil_64(X0, X1, 8, 8), 0xB3483C20, "bfxil x0, x1, #8, #8");
    case!(t, emit_lsl_imm_64(X0, X1, 4), 0xD37CEC20, "lsl x0, x1, #4");
    case!(t, emit_lsr_imm_64(X0, X1, 4), 0xD344FC20, "lsr x0, x1, #4");
    case!(t, emit_asr_imm_64(X0, X1, 4), 0x9344FC20, "asr x0, x1, #4");
    case!(t, emit_ror_imm_64(X0, X1, 4), 0x93C11020, "ror x0, x1, #4");
    case!(t, emit_lsl_imm_32(X0, X1, 4), 0x531C6C20, "lsl w0, w1, #4");
    case!(t, emit_sxtb_64(X0, X1), 0x93401C20, "sxtb x0, w1");
    case!(t, emit_sxth_64(X0, X1), 0x93403C20, "sxth x0, w1");
    case!(t, emit_sxtw(X0, X1), 0x93407C20, "sxtw x0, w1");
    case!(t, emit_uxtb(X0, X1), 0x53001C20, "uxtb w0, w1");
    case!(t, emit_uxth(X0, X1), 0x53003C20, "uxth w0, w1");

    // PC-relative (assembler-side forms need labels; static only)
    case!(t, emit_adr(X0, 0).unwrap(), 0x10000000, "");
    case!(t, emit_adr(X1, 8).unwrap(), 0x10000041, "");
    case!(t, emit_adrp(X0, 0).unwrap(), 0x90000000, "");

    // Loads and stores
    case!(t, emit_ldr_offset_64(X0, X1, 16).unwrap(), 0xF9400820, "ldr x0, [x1, #16]");
    case!(t, emit_str_offset_64(X0, X1, 0).unwrap(), 0xF9000020, "str x0, [x1]");
    case!(t, emit_ldr_offset_32(X2, Reg::SP, 4).unwrap(), 0xB94007E2, "ldr w2, [sp, #4]");
    case!(t, emit_ldr_offset_64(X0, X1, -8).unwrap(), 0xF85F8020, "ldur x0, [x1, #-8]");
    case!(t, emit_ldrb_offset(X0, X1, 0).unwrap(), 0x39400020, "ldrb w0, [x1]");
    case!(t, emit_ldrh_offset(X0, X1, 2).unwrap(), 0x79400420, "ldrh w0, [x1, #2]");
    case!(t, emit_strb_offset(X0, X1, 0).unwrap(), 0x39000020, "strb w0, [x1]");
    case!(t, emit_strh_offset(X0, X1, 0).unwrap(), 0x79000020, "strh w0, [x1]");
    case!(t, emit_ldrsb_offset_64(X0, X1, 0).unwrap(), 0x39800020, "ldrsb x0, [x1]");
    case!(t, emit_ldrsb_offset_32(X0, X1, 0).unwrap(), 0x39C00020, "ldrsb w0, [x1]");
    case!(t, emit_ldrsh_offset_64(X0, X1, 0).unwrap(), 0x79800020, "ldrsh x0, [x1]");
    case!(t, emit_ldrsw_offset(X0, X1, 0).unwrap(), 0xB9800020, "ldrsw x0, [x1]");
    case!(t, emit_ldr_pre_64(X0, X1, 8).unwrap(), 0xF8408C20, "ldr x0, [x1, #8]!");
    case!(t, emit_ldr_post_64(X0, X1, 8).unwrap(), 0xF8408420, "ldr x0, [x1], #8");
    case!(t, emit_str_pre_64(X0, Reg::SP, -16).unwrap(), 0xF81F0FE0, "str x0, [sp, #-16]!");
    case!(t, emit_str_post_64(X0, X1, 8).unwrap(), 0xF8008420, "str x0, [x1], #8");
    case!(
        t,
        emit_ldr_register_64(X0, X1, X2, IndexExtend::Lsl, false),
        0xF8626820,
        "ldr x0, [x1, x2]"
    );
    case!(
        t,
        emit_ldr_register_64(X0, X1, X2, IndexExtend::Lsl, true),
        0xF8627820,
        "ldr x0, [x1, x2, lsl #3]"
    );
    case!(
        t,
        emit_str_register_64(X0, X1, X2, IndexExtend::Lsl, false),
        0xF8226820,
        "str x0, [x1, x2]"
    );
    case!(t, emit_ldp_64(X0, X1, Reg::SP, 16).unwrap(), 0xA94107E0, "ldp x0, x1, [sp, #16]");
    case!(t, emit_stp_64(X0, X1, Reg::SP, 0).unwrap(), 0xA90007E0, "stp x0, x1, [sp]");
    case!(t, emit_ldp_32(X0, X1, X2, 0).unwrap(), 0x29400440, "ldp w0, w1, [x2]");
    case!(t, emit_stp_32(X0, X1, X2, 8).unwrap(), 0x29010440, "stp w0, w1, [x2, #8]");
    case!(
        t,
        emit_stp_pre_64(Reg::FP, Reg::LR, Reg::SP, -16).unwrap(),
        0xA9BF7BFD,
        "stp x29, x30, [sp, #-16]!"
    );
    case!(
        t,
        emit_ldp_post_64(Reg::FP, Reg::LR, Reg::SP, 16).unwrap(),
        0xA8C17BFD,
        "ldp x29, x30, [sp], #16"
    );

    // Atomics
    case!(t, emit_ldar_64(X0, X1), 0xC8DFFC20, "ldar x0, [x1]");
    case!(t, emit_ldar_32(X0, X1), 0x88DFFC20, "ldar w0, [x1]");
    case!(t, emit_stlr_64(X0, X1), 0xC89FFC20, "stlr x0, [x1]");
    case!(t, emit_ldxr_64(X0, X1), 0xC85F7C20, "ldxr x0, [x1]");
    case!(t, emit_stxr_64(X2, X0, X1), 0xC8027C20, "stxr w2, x0, [x1]");
    case!(t, emit_ldaxr_64(X0, X1), 0xC85FFC20, "ldaxr x0, [x1]");
    case!(t, emit_stlxr_64(X2, X0, X1), 0xC802FC20, "stlxr w2, x0, [x1]");
    case!(t, emit_ldaxp_64(X0, X1, X2), 0xC87F8440, "ldaxp x0, x1, [x2]");
    case!(t, emit_stlxp_64(X4, X0, X1, X2), 0xC8248440, "stlxp w4, x0, x1, [x2]");

    // System
    case!(t, emit_nop(), 0xD503201F, "nop");
    case!(t, emit_yield(), 0xD503203F, "yield");
    case!(t, emit_brk(0), 0xD4200000, "brk #0");
    case!(t, emit_brk(1), 0xD4200020, "brk #1");
    case!(t, emit_dmb(BarrierKind::Ish), 0xD5033BBF, "dmb ish");
    case!(t, emit_dmb(BarrierKind::Ishst), 0xD5033ABF, "dmb ishst");
    case!(t, emit_dmb(BarrierKind::Ishld), 0xD50339BF, "dmb ishld");
    case!(t, emit_mrs(X0, SysReg::NZCV), 0xD53B4200, "mrs x0, nzcv");
    case!(t, emit_msr(SysReg::NZCV, X0), 0xD51B4200, "msr nzcv, x0");
    case!(t, emit_mrs(X0, SysReg::FPCR), 0xD53B4400, "mrs x0, fpcr");
    case!(t, emit_mrs(X0, SysReg::FPSR), 0xD53B4420, "mrs x0, fpsr");
    case!(t, emit_mrs(X0, SysReg::TPIDR_EL0), 0xD53BD040, "mrs x0, tpidr_el0");
    case!(t, emit_mrs(X0, SysReg::CNTVCT_EL0), 0xD53BE040, "mrs x0, cntvct_el0");

    // NEON integer
    case!(t, emit_vadd(A::B16, V0, V1, V2), 0x4E228420, "add v0.16b, v1.16b, v2.16b");
    case!(t, emit_vadd(A::D2, V0, V1, V2), 0x4EE28420, "add v0.2d, v1.2d, v2.2d");
    case!(t, emit_vsub(A::H8, V3, V4, V5), 0x6E658483, "sub v3.8h, v4.8h, v5.8h");
    case!(t, emit_vmul(A::S4, V0, V1, V2), 0x4EA29C20, "mul v0.4s, v1.4s, v2.4s");
    case!(t, emit_vand(A::B16, V0, V1, V2), 0x4E221C20, "and v0.16b, v1.16b, v2.16b");
    case!(t, emit_vorr(A::B16, V0, V1, V2), 0x4EA21C20, "orr v0.16b, v1.16b, v2.16b");
    case!(t, emit_veor(A::B8, V0, V1, V2), 0x2E221C20, "eor v0.8b, v1.8b, v2.8b");
    case!(t, emit_vbic(A::B16, V0, V1, V2), 0x4E621C20, "bic v0.16b, v1.16b, v2.16b");
    case!(t, emit_vorn(A::B16, V0, V1, V2), 0x4EE21C20, "orn v0.16b, v1.16b, v2.16b");
    case!(t, emit_vbsl(A::B16, V0, V1, V2), 0x6E621C20, "bsl v0.16b, v1.16b, v2.16b");
    case!(t, emit_vnot(A::B16, V0, V1), 0x6E205820, "mvn v0.16b, v1.16b");
    case!(t, emit_sqadd(A::S4, V0, V1, V2), 0x4EA20C20, "sqadd v0.4s, v1.4s, v2.4s");
    case!(t, emit_uqadd(A::B16, V0, V1, V2), 0x6E220C20, "uqadd v0.16b, v1.16b, v2.16b");
    case!(t, emit_sqsub(A::H8, V0, V1, V2), 0x6E622C20, "sqsub v0.8h, v1.8h, v2.8h");
    case!(t, emit_uqsub(A::S4, V0, V1, V2), 0x6EA22C20, "uqsub v0.4s, v1.4s, v2.4s");
    case!(t, emit_smax(A::S4, V0, V1, V2), 0x4EA26420, "smax v0.4s, v1.4s, v2.4s");
    case!(t, emit_smin(A::S2, V0, V1, V2), 0x0EA26C20, "smin v0.2s, v1.2s, v2.2s");
    case!(t, emit_umax(A::B16, V0, V1, V2), 0x6E226420, "umax v0.16b, v1.16b, v2.16b");
    case!(t, emit_umin(A::H8, V0, V1, V2), 0x6E626C20, "umin v0.8h, v1.8h, v2.8h");

    // NEON comparisons
    case!(t, emit_cmeq(A::S4, V0, V1, V2), 0x6EA28C20, "cmeq v0.4s, v1.4s, v2.4s");
    case!(t, emit_cmgt(A::B16, V0, V1, V2), 0x4E223420, "cmgt v0.16b, v1.16b, v2.16b");
    case!(t, emit_cmge(A::B16, V0, V1, V2), 0x4E223C20, "cmge v0.16b, v1.16b, v2.16b");
    case!(t, emit_cmhi(A::B16, V0, V1, V2), 0x6E223420, "cmhi v0.16b, v1.16b, v2.16b");
    case!(t, emit_cmhs(A::B16, V0, V1, V2), 0x6E223C20, "cmhs v0.16b, v1.16b, v2.16b");
    case!(t, emit_cmtst(A::B16, V0, V1, V2), 0x4E228C20, "cmtst v0.16b, v1.16b, v2.16b");
    case!(t, emit_cmeq_zero(A::S4, V0, V1), 0x4EA09820, "cmeq v0.4s, v1.4s, #0");
    case!(t, emit_cmgt_zero(A::S4, V0, V1), 0x4EA08820, "cmgt v0.4s, v1.4s, #0");
    case!(t, emit_cmge_zero(A::S4, V0, V1), 0x6EA08820, "cmge v0.4s, v1.4s, #0");
    case!(t, emit_cmlt_zero(A::S4, V0, V1), 0x4EA0A820, "cmlt v0.4s, v1.4s, #0");
    case!(t, emit_cmle_zero(A::S4, V0, V1), 0x6EA09820, "cmle v0.4s, v1.4s, #0");

    // NEON pairwise / across-lane
    case!(t, emit_addp(A::S4, V0, V1, V2), 0x4EA2BC20, "addp v0.4s, v1.4s, v2.4s");
    case!(t, emit_smaxp(A::S4, V0, V1, V2), 0x4EA2A420, "smaxp v0.4s, v1.4s, v2.4s");
    case!(t, emit_sminp(A::S4, V0, V1, V2), 0x4EA2AC20, "sminp v0.4s, v1.4s, v2.4s");
    case!(t, emit_umaxp(A::S4, V0, V1, V2), 0x6EA2A420, "umaxp v0.4s, v1.4s, v2.4s");
    case!(t, emit_uminp(A::S4, V0, V1, V2), 0x6EA2AC20, "uminp v0.4s, v1.4s, v2.4s");
    case!(t, emit_addv(A::B16, V0, V1), 0x4E31B820, "addv b0, v1.16b");
    case!(t, emit_saddlv(A::B16, V0, V1), 0x4E303820, "saddlv h0, v1.16b");
    case!(t, emit_uaddlv(A::B16, V0, V1), 0x6E303820, "uaddlv h0, v1.16b");
    case!(t, emit_smaxv(A::B16, V0, V1), 0x4E30A820, "smaxv b0, v1.16b");
    case!(t, emit_sminv(A::B16, V0, V1), 0x4E31A820, "sminv b0, v1.16b");
    case!(t, emit_umaxv(A::B16, V0, V1), 0x6E30A820, "umaxv b0, v1.16b");
    case!(t, emit_uminv(A::H8, V0, V1), 0x6E71A820, "uminv h0, v1.8h");

    // NEON permutes
    case!(t, emit_zip1(A::B16, V0, V1, V2), 0x4E023820, "zip1 v0.16b, v1.16b, v2.16b");
    case!(t, emit_zip2(A::B16, V0, V1, V2), 0x4E027820, "zip2 v0.16b, v1.16b, v2.16b");
    case!(t, emit_uzp1(A::S4, V0, V1, V2), 0x4E821820, "uzp1 v0.4s, v1.4s, v2.4s");
    case!(t, emit_uzp2(A::S4, V0, V1, V2), 0x4E825820, "uzp2 v0.4s, v1.4s, v2.4s");
    case!(t, emit_trn1(A::B8, V0, V1, V2), 0x0E022820, "trn1 v0.8b, v1.8b, v2.8b");
    case!(t, emit_trn2(A::S2, V0, V1, V2), 0x0E826820, "trn2 v0.2s, v1.2s, v2.2s");

    // NEON long / narrow
    case!(t, emit_saddl(A::B8, V0, V1, V2), 0x0E220020, "saddl v0.8h, v1.8b, v2.8b");
    case!(t, emit_saddl(A::B16, V0, V1, V2), 0x4E220020, "saddl2 v0.8h, v1.16b, v2.16b");
    case!(t, emit_uaddl(A::B8, V0, V1, V2), 0x2E220020, "uaddl v0.8h, v1.8b, v2.8b");
    case!(t, emit_ssubl(A::B8, V0, V1, V2), 0x0E222020, "ssubl v0.8h, v1.8b, v2.8b");
    case!(t, emit_usubl(A::B8, V0, V1, V2), 0x2E222020, "usubl v0.8h, v1.8b, v2.8b");
    case!(t, emit_smull_vec(A::B8, V0, V1, V2), 0x0E22C020, "smull v0.8h, v1.8b, v2.8b");
    case!(t, emit_umull_vec(A::B8, V0, V1, V2), 0x2E22C020, "umull v0.8h, v1.8b, v2.8b");
    case!(t, emit_xtn(A::S2, V0, V1), 0x0EA12820, "xtn v0.2s, v1.2d");
    case!(t, emit_xtn(A::S4, V0, V1), 0x4EA12820, "xtn2 v0.4s, v1.2d");
    case!(t, emit_sqxtn(A::H4, V0, V1), 0x0E614820, "sqxtn v0.4h, v1.4s");
    case!(t, emit_uqxtn(A::B8, V0, V1), 0x2E214820, "uqxtn v0.8b, v1.8h");

    // NEON shift immediate
    case!(t, emit_shl_imm(A::S4, V0, V1, 1).unwrap(), 0x4F215420, "shl v0.4s, v1.4s, #1");
    case!(t, emit_sshr_imm(A::S4, V0, V1, 1).unwrap(), 0x4F3F0420, "sshr v0.4s, v1.4s, #1");
    case!(t, emit_ushr_imm(A::D2, V0, V1, 1).unwrap(), 0x6F7F0420, "ushr v0.2d, v1.2d, #1");
    case!(t, emit_sxtl(A::B8, V0, V1), 0x0F08A420, "sxtl v0.8h, v1.8b");
    case!(t, emit_uxtl(A::B8, V0, V1), 0x2F08A420, "uxtl v0.8h, v1.8b");

    // NEON lane moves
    case!(t, emit_dup_element(A::B16, V0, V1, 0).unwrap(), 0x4E010420, "dup v0.16b, v1.b[0]");
    case!(t, emit_dup_general(A::S4, V0, X1), 0x4E040C20, "dup v0.4s, w1");
    case!(t, emit_ins_general(A::S4, V0, 1, X1).unwrap(), 0x4E0C1C20, "mov v0.s[1], w1");
    case!(
        t,
        emit_ins_element(A::S4, V0, 1, V1, 0).unwrap(),
        0x6E0C0420,
        "mov v0.s[1], v1.s[0]"
    );
    case!(t, emit_smov(A::B16, X0, V1, 0, false).unwrap(), 0x0E012C20, "smov w0, v1.b[0]");
    case!(t, emit_smov(A::S4, X0, V1, 1, true).unwrap(), 0x4E0C2C20, "smov x0, v1.s[1]");
    case!(t, emit_umov(A::S4, X0, V1, 1).unwrap(), 0x0E0C3C20, "umov w0, v1.s[1]");
    case!(t, emit_umov(A::D2, X0, V1, 1).unwrap(), 0x4E183C20, "mov x0, v1.d[1]");

    // NEON immediates
    case!(t, emit_movi(A::S4, V0, 1).unwrap(), 0x4F000420, "movi v0.4s, #1");
    case!(
        t,
        emit_movi(A::D2, V0, 0x0000_FF00_0000_00FF).unwrap(),
        0x6F01E420,
        "movi v0.2d, #0x0000ff00000000ff"
    );

    // FP binary
    case!(t, emit_fadd(A::S, V0, V1, V2), 0x1E222820, "fadd s0, s1, s2");
    case!(t, emit_fadd(A::D, V0, V1, V2), 0x1E622820, "fadd d0, d1, d2");
    case!(t, emit_fadd(A::S4, V0, V1, V2), 0x4E22D420, "fadd v0.4s, v1.4s, v2.4s");
    case!(t, emit_fadd(A::D2, V0, V1, V2), 0x4E62D420, "fadd v0.2d, v1.2d, v2.2d");
    case!(t, emit_fsub(A::S, V0, V1, V2), 0x1E223820, "fsub s0, s1, s2");
    case!(t, emit_fsub(A::S4, V0, V1, V2), 0x4EA2D420, "fsub v0.4s, v1.4s, v2.4s");
    case!(t, emit_fmul(A::D, V0, V1, V2), 0x1E620820, "fmul d0, d1, d2");
    case!(t, emit_fmul(A::S4, V0, V1, V2), 0x6E22DC20, "fmul v0.4s, v1.4s, v2.4s");
    case!(t, emit_fdiv(A::S, V0, V1, V2), 0x1E221820, "fdiv s0, s1, s2");
    case!(t, emit_fdiv(A::S4, V0, V1, V2), 0x6E22FC20, "fdiv v0.4s, v1.4s, v2.4s");
    case!(t, emit_fmax(A::S, V0, V1, V2), 0x1E224820, "fmax s0, s1, s2");
    case!(t, emit_fmin(A::S, V0, V1, V2), 0x1E225820, "fmin s0, s1, s2");
    case!(t, emit_fmaxnm(A::S, V0, V1, V2), 0x1E226820, "fmaxnm s0, s1, s2");
    case!(t, emit_fminnm(A::S, V0, V1, V2), 0x1E227820, "fminnm s0, s1, s2");
    case!(t, emit_fmax(A::S4, V0, V1, V2), 0x4E22F420, "fmax v0.4s, v1.4s, v2.4s");
    case!(t, emit_fmin(A::S4, V0, V1, V2), 0x4EA2F420, "fmin v0.4s, v1.4s, v2.4s");
    case!(t, emit_fnmul(A::S, V0, V1, V2), 0x1E228820, "fnmul s0, s1, s2");

    // FP fused multiply-add
    case!(t, emit_fmla(A::S4, V0, V1, V2), 0x4E22CC20, "fmla v0.4s, v1.4s, v2.4s");
    case!(t, emit_fmls(A::S4, V0, V1, V2), 0x4EA2CC20, "fmls v0.4s, v1.4s, v2.4s");
    case!(t, emit_fmadd(A::S, V0, V1, V2, V3), 0x1F020C20, "fmadd s0, s1, s2, s3");
    case!(t, emit_fmadd(A::D, V0, V1, V2, V3), 0x1F420C20, "fmadd d0, d1, d2, d3");
    case!(t, emit_fmsub(A::S, V0, V1, V2, V3), 0x1F028C20, "fmsub s0, s1, s2, s3");
    case!(t, emit_fnmadd(A::S, V0, V1, V2, V3), 0x1F220C20, "fnmadd s0, s1, s2, s3");
    case!(t, emit_fnmsub(A::S, V0, V1, V2, V3), 0x1F228C20, "fnmsub s0, s1, s2, s3");

    // FP unary
    case!(t, emit_fabs(A::S, V0, V1), 0x1E20C020, "fabs s0, s1");
    case!(t, emit_fabs(A::D, V0, V1), 0x1E60C020, "fabs d0, d1");
    case!(t, emit_fabs(A::S4, V0, V1), 0x4EA0F820, "fabs v0.4s, v1.4s");
    case!(t, emit_fneg(A::S, V0, V1), 0x1E214020, "fneg s0, s1");
    case!(t, emit_fneg(A::S4, V0, V1), 0x6EA0F820, "fneg v0.4s, v1.4s");
    case!(t, emit_fsqrt(A::S, V0, V1), 0x1E21C020, "fsqrt s0, s1");
    case!(t, emit_fsqrt(A::S4, V0, V1), 0x6EA1F820, "fsqrt v0.4s, v1.4s");
    case!(t, emit_fmov_reg(A::S, V0, V1), 0x1E204020, "fmov s0, s1");
    case!(t, emit_fmov_reg(A::D, V0, V1), 0x1E604020, "fmov d0, d1");
    case!(t, emit_fcvt_single_to_double(V0, V1), 0x1E22C020, "fcvt d0, s1");
    case!(t, emit_fcvt_double_to_single(V0, V1), 0x1E624020, "fcvt s0, d1");

    // FP compare
    case!(t, emit_fcmp(A::D, V0, V1), 0x1E612000, "fcmp d0, d1");
    case!(t, emit_fcmp_zero(A::S, V3), 0x1E202068, "fcmp s3, #0.0");
    case!(t, emit_fcmpe(A::S, V0, V1), 0x1E212010, "fcmpe s0, s1");
    case!(t, emit_fcmpe_zero(A::D, V0), 0x1E602018, "fcmpe d0, #0.0");
    case!(t, emit_fcmeq(A::S4, V0, V1, V2), 0x4E22E420, "fcmeq v0.4s, v1.4s, v2.4s");
    case!(t, emit_fcmge(A::S4, V0, V1, V2), 0x6E22E420, "fcmge v0.4s, v1.4s, v2.4s");
    case!(t, emit_fcmgt(A::S4, V0, V1, V2), 0x6EA2E420, "fcmgt v0.4s, v1.4s, v2.4s");
    case!(t, emit_fcmeq_zero(A::S4, V0, V1), 0x4EA0D820, "fcmeq v0.4s, v1.4s, #0.0");
    case!(t, emit_fcmge_zero(A::S4, V0, V1), 0x6EA0C820, "fcmge v0.4s, v1.4s, #0.0");
    case!(t, emit_fcmgt_zero(A::S4, V0, V1), 0x4EA0C820, "fcmgt v0.4s, v1.4s, #0.0");
    case!(t, emit_fcmle_zero(A::S4, V0, V1), 0x6EA0D820, "fcmle v0.4s, v1.4s, #0.0");
    case!(t, emit_fcmlt_zero(A::S4, V0, V1), 0x4EA0E820, "fcmlt v0.4s, v1.4s, #0.0");

    // FP <-> integer conversions
    case!(
        t,
        emit_fcvt_to_int(FpRound::Zero, true, X0, true, A::D, V1),
        0x9E780020,
        "fcvtzs x0, d1"
    );
    case!(
        t,
        emit_fcvt_to_int(FpRound::Zero, false, X0, false, A::S, V1),
        0x1E390020,
        "fcvtzu w0, s1"
    );
    case!(
        t,
        emit_fcvt_to_int(FpRound::TiesAway, false, X2, false, A::S, V3),
        0x1E250062,
        "fcvtau w2, s3"
    );
    case!(
        t,
        emit_fcvt_to_int(FpRound::Minus, true, X0, true, A::S, V1),
        0x9E300020,
        "fcvtms x0, s1"
    );
    case!(
        t,
        emit_fcvt_to_int(FpRound::Nearest, true, X0, false, A::S, V1),
        0x1E200020,
        "fcvtns w0, s1"
    );
    case!(
        t,
        emit_fcvt_to_int(FpRound::Plus, true, X1, true, A::D, V2),
        0x9E680041,
        "fcvtps x1, d2"
    );
    case!(t, emit_scvtf_general(A::D, V0, X1, true), 0x9E620020, "scvtf d0, x1");
    case!(t, emit_scvtf_general(A::S, V0, X1, false), 0x1E220020, "scvtf s0, w1");
    case!(t, emit_ucvtf_general(A::S, V0, X1, false), 0x1E230020, "ucvtf s0, w1");
    case!(
        t,
        emit_fcvt_to_int_vector(FpRound::Zero, true, A::S4, V0, V1),
        0x4EA1B820,
        "fcvtzs v0.4s, v1.4s"
    );
    case!(
        t,
        emit_fcvt_to_int_vector(FpRound::Nearest, true, A::S2, V0, V1),
        0x0E21A820,
        "fcvtns v0.2s, v1.2s"
    );
    case!(
        t,
        emit_fcvt_to_int_vector(FpRound::TiesAway, false, A::S4, V0, V1),
        0x6E21C820,
        "fcvtau v0.4s, v1.4s"
    );
    case!(t, emit_scvtf_vector(A::S2, V0, V1), 0x0E21D820, "scvtf v0.2s, v1.2s");
    case!(t, emit_ucvtf_vector(A::S4, V0, V1), 0x6E21D820, "ucvtf v0.4s, v1.4s");

    // SIMD memory
    case!(t, emit_ldr_fp(A::Q, V0, X1, 0).unwrap(), 0x3DC00020, "ldr q0, [x1]");
    case!(t, emit_ldr_fp(A::D, V0, X1, 8).unwrap(), 0xFD400420, "ldr d0, [x1, #8]");
    case!(t, emit_ldr_fp(A::B, V0, X1, 0).unwrap(), 0x3D400020, "ldr b0, [x1]");
    case!(t, emit_ldr_fp(A::H, V0, X1, 2).unwrap(), 0x7D400420, "ldr h0, [x1, #2]");
    case!(t, emit_str_fp(A::S, V2, Reg::SP, 4).unwrap(), 0xBD0007E2, "str s2, [sp, #4]");
    case!(t, emit_str_fp(A::Q, V0, X1, 16).unwrap(), 0x3D800420, "str q0, [x1, #16]");
    case!(t, emit_ldr_fp(A::D, V0, X1, -8).unwrap(), 0xFC5F8020, "ldur d0, [x1, #-8]");
    case!(t, emit_ldp_fp(A::D, V0, V1, Reg::SP, 16).unwrap(), 0x6D4107E0, "ldp d0, d1, [sp, #16]");
    case!(t, emit_ldp_fp(A::S, V0, V1, X2, 0).unwrap(), 0x2D400440, "ldp s0, s1, [x2]");
    case!(t, emit_stp_fp(A::Q, V0, V1, Reg::SP, 32).unwrap(), 0xAD0107E0, "stp q0, q1, [sp, #32]");
    case!(t, emit_ld1_lane(A::S, V0, 1, X1).unwrap(), 0x0D409020, "ld1 {v0.s}[1], [x1]");
    case!(t, emit_ld1_lane(A::B, V0, 3, X1).unwrap(), 0x0D400C20, "ld1 {v0.b}[3], [x1]");
    case!(t, emit_st1_lane(A::D, V0, 1, X1).unwrap(), 0x4D008420, "st1 {v0.d}[1], [x1]");

    // Crypto
    case!(t, emit_aese(V0, V1), 0x4E284820, "aese v0.16b, v1.16b");
    case!(t, emit_aesd(V0, V1), 0x4E285820, "aesd v0.16b, v1.16b");
    case!(t, emit_aesmc(V0, V1), 0x4E286820, "aesmc v0.16b, v1.16b");
    case!(t, emit_aesimc(V0, V1), 0x4E287820, "aesimc v0.16b, v1.16b");

    t
}

/// Compare every encoder output against its recorded word.
pub fn check_static(cases: &[VerifyCase]) -> Vec<Mismatch> {
    cases
        .iter()
        .enumerate()
        .filter(|(_, case)| case.encoded != case.expected)
        .map(|(index, case)| Mismatch {
            index,
            text: case.text.to_string(),
            expected: case.expected,
            actual: case.encoded,
        })
        .collect()
}

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("{tool} exited with failure:\n{stderr}")]
    ToolFailed { tool: String, stderr: String },
    #[error("expected {expected} instruction words in listing, found {found}")]
    WordCount { expected: usize, found: usize },
}

/// External tool configuration for the round-trip harness. The dumper
/// may be any objdump-like program whose listing carries one 8-digit
/// hex instruction word per line.
#[derive(Debug, Clone)]
pub struct ToolConfig {
    pub assembler: String,
    pub assembler_args: Vec<String>,
    pub dumper: String,
    pub dumper_args: Vec<String>,
    pub scratch_dir: PathBuf,
}

impl Default for ToolConfig {
    fn default() -> Self {
        ToolConfig {
            assembler: "clang".to_string(),
            assembler_args: vec!["-c".to_string(), "-x".to_string(), "assembler".to_string()],
            dumper: "objdump".to_string(),
            dumper_args: vec!["-d".to_string()],
            scratch_dir: std::env::temp_dir(),
        }
    }
}

/// Assemble every textual form and compare the assembled words against
/// the encoder output. Cases with empty text are skipped.
pub fn check_assembler(cases: &[VerifyCase], config: &ToolConfig) -> Result<Vec<Mismatch>, HarnessError> {
    let textual: Vec<&VerifyCase> = cases.iter().filter(|case| !case.text.is_empty()).collect();

    let mut source = String::from(".text\n");
    for case in &textual {
        source.push_str(case.text);
        source.push('\n');
    }

    let asm_path = config.scratch_dir.join("fb_verify.s");
    let obj_path = config.scratch_dir.join("fb_verify.o");
    fs::write(&asm_path, source)?;

    let output = Command::new(&config.assembler)
        .args(&config.assembler_args)
        .arg(&asm_path)
        .arg("-o")
        .arg(&obj_path)
        .output()?;
    if !output.status.success() {
        return Err(HarnessError::ToolFailed {
            tool: config.assembler.clone(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    let output = Command::new(&config.dumper)
        .args(&config.dumper_args)
        .arg(&obj_path)
        .output()?;
    if !output.status.success() {
        return Err(HarnessError::ToolFailed {
            tool: config.dumper.clone(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    let listing = String::from_utf8_lossy(&output.stdout);
    let words = parse_listing_words(&listing);
    if words.len() != textual.len() {
        return Err(HarnessError::WordCount {
            expected: textual.len(),
            found: words.len(),
        });
    }

    Ok(textual
        .iter()
        .zip(words)
        .enumerate()
        .filter(|(_, (case, word))| case.encoded != *word)
        .map(|(index, (case, word))| Mismatch {
            index,
            text: case.text.to_string(),
            expected: word,
            actual: case.encoded,
        })
        .collect())
}

/// The first 8-hex-digit token on each non-empty line is an
/// instruction word; everything else (offsets, mnemonics, section
/// headers) falls through.
fn parse_listing_words(listing: &str) -> Vec<u32> {
    let mut words = Vec::new();
    for line in listing.lines() {
        for token in line.split_whitespace() {
            if token.len() == 8 && token.chars().all(|c| c.is_ascii_hexdigit()) {
                words.push(u32::from_str_radix(token, 16).unwrap());
                break;
            }
        }
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_table_is_consistent() {
        let cases = build_cases();
        let mismatches = check_static(&cases);
        assert!(
            mismatches.is_empty(),
            "{} mismatches, first: {:?}",
            mismatches.len(),
            mismatches.first()
        );
    }

    #[test]
    fn test_table_covers_every_family() {
        let cases = build_cases();
        assert!(cases.len() > 150);
        // Spot-check a few family representatives by text.
        for needle in ["bl #0", "madd", "ldaxp", "aese", "fcvtzs x0, d1", "movi v0.4s"] {
            assert!(
                cases.iter().any(|case| case.text.contains(needle)),
                "missing {}",
                needle
            );
        }
    }

    #[test]
    fn test_parse_listing_words() {
        let listing = "\n\
            out.o: file format elf64-littleaarch64\n\
            Disassembly of section .text:\n\
            0000000000000000 <.text>:\n\
            \u{20}  0:\t8b020020 \tadd\tx0, x1, x2\n\
            \u{20}  4:\td503201f \tnop\n";
        assert_eq!(parse_listing_words(listing), vec![0x8B020020, 0xD503201F]);
    }
}
