//! Data-processing encodings: register and immediate arithmetic,
//! logical operations, shifts, multiply/divide, move-wide, conditional
//! selects, and bitfield operations.

use super::bitmask::{encode_logical_immediate_32, encode_logical_immediate_64};
use super::{Cond, Extend, Operand2, Operand2Kind, Reg, Shift};

// Operand-2 field placement shared by the shifted/extended register
// forms: the extended form flips bit 21 and moves the amount into imm3.
fn operand2_arith(base: u32, op2: Operand2) -> u32 {
    match op2.kind {
        Operand2Kind::Plain => base | (op2.reg.index() << 16),
        Operand2Kind::Shifted(shift, amount) => {
            base | ((shift as u32) << 22) | (op2.reg.index() << 16) | ((amount as u32) << 10)
        }
        Operand2Kind::Extended(extend, amount) => {
            base | (1 << 21)
                | (op2.reg.index() << 16)
                | ((extend as u32) << 13)
                | ((amount as u32) << 10)
        }
    }
}

// The logical group has no extended-register form; an extended operand
// is encoded as the bare register.
fn operand2_logical(base: u32, op2: Operand2) -> u32 {
    match op2.kind {
        Operand2Kind::Shifted(shift, amount) => {
            base | ((shift as u32) << 22) | (op2.reg.index() << 16) | ((amount as u32) << 10)
        }
        _ => base | (op2.reg.index() << 16),
    }
}

fn rd_rn(rd: Reg, rn: Reg) -> u32 {
    (rn.index() << 5) | rd.index()
}

// ---------------------------------------------------------------------------
// Arithmetic, register forms
// ---------------------------------------------------------------------------

pub fn emit_add_register_64(rd: Reg, rn: Reg, op2: Operand2) -> u32 {
    operand2_arith(0x8B00_0000, op2) | rd_rn(rd, rn)
}

pub fn emit_add_register_32(rd: Reg, rn: Reg, op2: Operand2) -> u32 {
    operand2_arith(0x0B00_0000, op2) | rd_rn(rd, rn)
}

pub fn emit_adds_register_64(rd: Reg, rn: Reg, op2: Operand2) -> u32 {
    operand2_arith(0xAB00_0000, op2) | rd_rn(rd, rn)
}

pub fn emit_adds_register_32(rd: Reg, rn: Reg, op2: Operand2) -> u32 {
    operand2_arith(0x2B00_0000, op2) | rd_rn(rd, rn)
}

pub fn emit_sub_register_64(rd: Reg, rn: Reg, op2: Operand2) -> u32 {
    operand2_arith(0xCB00_0000, op2) | rd_rn(rd, rn)
}

pub fn emit_sub_register_32(rd: Reg, rn: Reg, op2: Operand2) -> u32 {
    operand2_arith(0x4B00_0000, op2) | rd_rn(rd, rn)
}

pub fn emit_subs_register_64(rd: Reg, rn: Reg, op2: Operand2) -> u32 {
    operand2_arith(0xEB00_0000, op2) | rd_rn(rd, rn)
}

pub fn emit_subs_register_32(rd: Reg, rn: Reg, op2: Operand2) -> u32 {
    operand2_arith(0x6B00_0000, op2) | rd_rn(rd, rn)
}

/// CMP is SUBS with the zero register as destination.
pub fn emit_cmp_register_64(rn: Reg, op2: Operand2) -> u32 {
    emit_subs_register_64(Reg::ZR, rn, op2)
}

pub fn emit_cmp_register_32(rn: Reg, op2: Operand2) -> u32 {
    emit_subs_register_32(Reg::ZR, rn, op2)
}

/// CMN is ADDS with the zero register as destination.
pub fn emit_cmn_register_64(rn: Reg, op2: Operand2) -> u32 {
    emit_adds_register_64(Reg::ZR, rn, op2)
}

/// NEG is SUB from the zero register.
pub fn emit_neg_64(rd: Reg, op2: Operand2) -> u32 {
    emit_sub_register_64(rd, Reg::ZR, op2)
}

pub fn emit_neg_32(rd: Reg, op2: Operand2) -> u32 {
    emit_sub_register_32(rd, Reg::ZR, op2)
}

// ---------------------------------------------------------------------------
// Logical, register forms
// ---------------------------------------------------------------------------

pub fn emit_and_register_64(rd: Reg, rn: Reg, op2: Operand2) -> u32 {
    operand2_logical(0x8A00_0000, op2) | rd_rn(rd, rn)
}

pub fn emit_and_register_32(rd: Reg, rn: Reg, op2: Operand2) -> u32 {
    operand2_logical(0x0A00_0000, op2) | rd_rn(rd, rn)
}

pub fn emit_ands_register_64(rd: Reg, rn: Reg, op2: Operand2) -> u32 {
    operand2_logical(0xEA00_0000, op2) | rd_rn(rd, rn)
}

pub fn emit_ands_register_32(rd: Reg, rn: Reg, op2: Operand2) -> u32 {
    operand2_logical(0x6A00_0000, op2) | rd_rn(rd, rn)
}

pub fn emit_orr_register_64(rd: Reg, rn: Reg, op2: Operand2) -> u32 {
    operand2_logical(0xAA00_0000, op2) | rd_rn(rd, rn)
}

pub fn emit_orr_register_32(rd: Reg, rn: Reg, op2: Operand2) -> u32 {
    operand2_logical(0x2A00_0000, op2) | rd_rn(rd, rn)
}

pub fn emit_eor_register_64(rd: Reg, rn: Reg, op2: Operand2) -> u32 {
    operand2_logical(0xCA00_0000, op2) | rd_rn(rd, rn)
}

pub fn emit_eor_register_32(rd: Reg, rn: Reg, op2: Operand2) -> u32 {
    operand2_logical(0x4A00_0000, op2) | rd_rn(rd, rn)
}

pub fn emit_bic_register_64(rd: Reg, rn: Reg, op2: Operand2) -> u32 {
    operand2_logical(0x8A20_0000, op2) | rd_rn(rd, rn)
}

pub fn emit_bic_register_32(rd: Reg, rn: Reg, op2: Operand2) -> u32 {
    operand2_logical(0x0A20_0000, op2) | rd_rn(rd, rn)
}

pub fn emit_bics_register_64(rd: Reg, rn: Reg, op2: Operand2) -> u32 {
    operand2_logical(0xEA20_0000, op2) | rd_rn(rd, rn)
}

pub fn emit_orn_register_64(rd: Reg, rn: Reg, op2: Operand2) -> u32 {
    operand2_logical(0xAA20_0000, op2) | rd_rn(rd, rn)
}

pub fn emit_orn_register_32(rd: Reg, rn: Reg, op2: Operand2) -> u32 {
    operand2_logical(0x2A20_0000, op2) | rd_rn(rd, rn)
}

pub fn emit_eon_register_64(rd: Reg, rn: Reg, op2: Operand2) -> u32 {
    operand2_logical(0xCA20_0000, op2) | rd_rn(rd, rn)
}

/// TST is ANDS with the zero register as destination.
pub fn emit_tst_register_64(rn: Reg, op2: Operand2) -> u32 {
    emit_ands_register_64(Reg::ZR, rn, op2)
}

/// Register move: ORR rd, zr, rm.
pub fn emit_mov_register_64(rd: Reg, rm: Reg) -> u32 {
    emit_orr_register_64(rd, Reg::ZR, super::reg_only(rm))
}

pub fn emit_mov_register_32(rd: Reg, rm: Reg) -> u32 {
    emit_orr_register_32(rd, Reg::ZR, super::reg_only(rm))
}

/// Bitwise not: ORN rd, zr, rm.
pub fn emit_mvn_64(rd: Reg, op2: Operand2) -> u32 {
    emit_orn_register_64(rd, Reg::ZR, op2)
}

pub fn emit_mvn_32(rd: Reg, op2: Operand2) -> u32 {
    emit_orn_register_32(rd, Reg::ZR, op2)
}

// ---------------------------------------------------------------------------
// Variable shifts
// ---------------------------------------------------------------------------

fn shift_variable(sf: u32, op: u32, rd: Reg, rn: Reg, rm: Reg) -> u32 {
    (sf << 31) | 0x1AC0_2000 | (op << 10) | (rm.index() << 16) | rd_rn(rd, rn)
}

pub fn emit_lsl_register_64(rd: Reg, rn: Reg, rm: Reg) -> u32 {
    shift_variable(1, 0, rd, rn, rm)
}

pub fn emit_lsl_register_32(rd: Reg, rn: Reg, rm: Reg) -> u32 {
    shift_variable(0, 0, rd, rn, rm)
}

pub fn emit_lsr_register_64(rd: Reg, rn: Reg, rm: Reg) -> u32 {
    shift_variable(1, 1, rd, rn, rm)
}

pub fn emit_lsr_register_32(rd: Reg, rn: Reg, rm: Reg) -> u32 {
    shift_variable(0, 1, rd, rn, rm)
}

pub fn emit_asr_register_64(rd: Reg, rn: Reg, rm: Reg) -> u32 {
    shift_variable(1, 2, rd, rn, rm)
}

pub fn emit_asr_register_32(rd: Reg, rn: Reg, rm: Reg) -> u32 {
    shift_variable(0, 2, rd, rn, rm)
}

pub fn emit_ror_register_64(rd: Reg, rn: Reg, rm: Reg) -> u32 {
    shift_variable(1, 3, rd, rn, rm)
}

pub fn emit_ror_register_32(rd: Reg, rn: Reg, rm: Reg) -> u32 {
    shift_variable(0, 3, rd, rn, rm)
}

// ---------------------------------------------------------------------------
// Multiply / divide
// ---------------------------------------------------------------------------

fn madd_family(base: u32, rd: Reg, rn: Reg, rm: Reg, ra: Reg) -> u32 {
    base | (rm.index() << 16) | (ra.index() << 10) | rd_rn(rd, rn)
}

pub fn emit_madd_64(rd: Reg, rn: Reg, rm: Reg, ra: Reg) -> u32 {
    madd_family(0x9B00_0000, rd, rn, rm, ra)
}

pub fn emit_madd_32(rd: Reg, rn: Reg, rm: Reg, ra: Reg) -> u32 {
    madd_family(0x1B00_0000, rd, rn, rm, ra)
}

pub fn emit_msub_64(rd: Reg, rn: Reg, rm: Reg, ra: Reg) -> u32 {
    madd_family(0x9B00_8000, rd, rn, rm, ra)
}

pub fn emit_msub_32(rd: Reg, rn: Reg, rm: Reg, ra: Reg) -> u32 {
    madd_family(0x1B00_8000, rd, rn, rm, ra)
}

/// Signed 32x32 -> 64 multiply-add.
pub fn emit_smaddl(rd: Reg, rn: Reg, rm: Reg, ra: Reg) -> u32 {
    madd_family(0x9B20_0000, rd, rn, rm, ra)
}

pub fn emit_smsubl(rd: Reg, rn: Reg, rm: Reg, ra: Reg) -> u32 {
    madd_family(0x9B20_8000, rd, rn, rm, ra)
}

/// Unsigned 32x32 -> 64 multiply-add.
pub fn emit_umaddl(rd: Reg, rn: Reg, rm: Reg, ra: Reg) -> u32 {
    madd_family(0x9BA0_0000, rd, rn, rm, ra)
}

pub fn emit_umsubl(rd: Reg, rn: Reg, rm: Reg, ra: Reg) -> u32 {
    madd_family(0x9BA0_8000, rd, rn, rm, ra)
}

/// MUL is MADD with a zero addend.
pub fn emit_mul_64(rd: Reg, rn: Reg, rm: Reg) -> u32 {
    emit_madd_64(rd, rn, rm, Reg::ZR)
}

pub fn emit_mul_32(rd: Reg, rn: Reg, rm: Reg) -> u32 {
    emit_madd_32(rd, rn, rm, Reg::ZR)
}

pub fn emit_smulh(rd: Reg, rn: Reg, rm: Reg) -> u32 {
    madd_family(0x9B40_0000, rd, rn, rm, Reg::ZR)
}

pub fn emit_umulh(rd: Reg, rn: Reg, rm: Reg) -> u32 {
    madd_family(0x9BC0_0000, rd, rn, rm, Reg::ZR)
}

pub fn emit_sdiv_64(rd: Reg, rn: Reg, rm: Reg) -> u32 {
    0x9AC0_0C00 | (rm.index() << 16) | rd_rn(rd, rn)
}

pub fn emit_sdiv_32(rd: Reg, rn: Reg, rm: Reg) -> u32 {
    0x1AC0_0C00 | (rm.index() << 16) | rd_rn(rd, rn)
}

pub fn emit_udiv_64(rd: Reg, rn: Reg, rm: Reg) -> u32 {
    0x9AC0_0800 | (rm.index() << 16) | rd_rn(rd, rn)
}

pub fn emit_udiv_32(rd: Reg, rn: Reg, rm: Reg) -> u32 {
    0x1AC0_0800 | (rm.index() << 16) | rd_rn(rd, rn)
}

// ---------------------------------------------------------------------------
// Arithmetic, immediate forms
// ---------------------------------------------------------------------------

// 12-bit unsigned immediate, optionally shifted left by 12.
fn imm12_fields(imm: u64) -> Option<u32> {
    if imm < 0x1000 {
        Some((imm as u32) << 10)
    } else if imm & 0xFFF == 0 && imm < 0x100_0000 {
        Some((1 << 22) | ((imm >> 12) as u32) << 10)
    } else {
        None
    }
}

fn add_sub_imm(add_base: u32, sub_base: u32, rd: Reg, rn: Reg, imm: i64) -> Option<u32> {
    // Try the requested operation first, then the opposite one with the
    // negated immediate.
    if imm >= 0 {
        if let Some(fields) = imm12_fields(imm as u64) {
            return Some(add_base | fields | rd_rn(rd, rn));
        }
    }
    if imm < 0 {
        if let Some(fields) = imm12_fields(imm.unsigned_abs()) {
            return Some(sub_base | fields | rd_rn(rd, rn));
        }
    }
    None
}

pub fn emit_add_imm_64(rd: Reg, rn: Reg, imm: i64) -> Option<u32> {
    add_sub_imm(0x9100_0000, 0xD100_0000, rd, rn, imm)
}

pub fn emit_add_imm_32(rd: Reg, rn: Reg, imm: i64) -> Option<u32> {
    add_sub_imm(0x1100_0000, 0x5100_0000, rd, rn, imm)
}

pub fn emit_adds_imm_64(rd: Reg, rn: Reg, imm: i64) -> Option<u32> {
    add_sub_imm(0xB100_0000, 0xF100_0000, rd, rn, imm)
}

pub fn emit_adds_imm_32(rd: Reg, rn: Reg, imm: i64) -> Option<u32> {
    add_sub_imm(0x3100_0000, 0x7100_0000, rd, rn, imm)
}

pub fn emit_sub_imm_64(rd: Reg, rn: Reg, imm: i64) -> Option<u32> {
    add_sub_imm(0xD100_0000, 0x9100_0000, rd, rn, imm)
}

pub fn emit_sub_imm_32(rd: Reg, rn: Reg, imm: i64) -> Option<u32> {
    add_sub_imm(0x5100_0000, 0x1100_0000, rd, rn, imm)
}

pub fn emit_subs_imm_64(rd: Reg, rn: Reg, imm: i64) -> Option<u32> {
    add_sub_imm(0xF100_0000, 0xB100_0000, rd, rn, imm)
}

pub fn emit_subs_imm_32(rd: Reg, rn: Reg, imm: i64) -> Option<u32> {
    add_sub_imm(0x7100_0000, 0x3100_0000, rd, rn, imm)
}

/// CMP with immediate: SUBS to the zero register.
pub fn emit_cmp_imm_64(rn: Reg, imm: i64) -> Option<u32> {
    emit_subs_imm_64(Reg::ZR, rn, imm)
}

pub fn emit_cmp_imm_32(rn: Reg, imm: i64) -> Option<u32> {
    emit_subs_imm_32(Reg::ZR, rn, imm)
}

// ---------------------------------------------------------------------------
// Logical, immediate forms
// ---------------------------------------------------------------------------

fn logical_imm_64(base: u32, rd: Reg, rn: Reg, imm: u64) -> Option<u32> {
    let enc = encode_logical_immediate_64(imm)?;
    Some(base | (enc.bits() << 10) | rd_rn(rd, rn))
}

fn logical_imm_32(base: u32, rd: Reg, rn: Reg, imm: u32) -> Option<u32> {
    let enc = encode_logical_immediate_32(imm)?;
    Some(base | (enc.bits() << 10) | rd_rn(rd, rn))
}

pub fn emit_and_imm_64(rd: Reg, rn: Reg, imm: u64) -> Option<u32> {
    logical_imm_64(0x9200_0000, rd, rn, imm)
}

pub fn emit_and_imm_32(rd: Reg, rn: Reg, imm: u32) -> Option<u32> {
    logical_imm_32(0x1200_0000, rd, rn, imm)
}

pub fn emit_orr_imm_64(rd: Reg, rn: Reg, imm: u64) -> Option<u32> {
    logical_imm_64(0xB200_0000, rd, rn, imm)
}

pub fn emit_orr_imm_32(rd: Reg, rn: Reg, imm: u32) -> Option<u32> {
    logical_imm_32(0x3200_0000, rd, rn, imm)
}

pub fn emit_eor_imm_64(rd: Reg, rn: Reg, imm: u64) -> Option<u32> {
    logical_imm_64(0xD200_0000, rd, rn, imm)
}

pub fn emit_eor_imm_32(rd: Reg, rn: Reg, imm: u32) -> Option<u32> {
    logical_imm_32(0x5200_0000, rd, rn, imm)
}

pub fn emit_ands_imm_64(rd: Reg, rn: Reg, imm: u64) -> Option<u32> {
    logical_imm_64(0xF200_0000, rd, rn, imm)
}

pub fn emit_ands_imm_32(rd: Reg, rn: Reg, imm: u32) -> Option<u32> {
    logical_imm_32(0x7200_0000, rd, rn, imm)
}

/// TST with immediate: ANDS to the zero register.
pub fn emit_tst_imm_64(rn: Reg, imm: u64) -> Option<u32> {
    emit_ands_imm_64(Reg::ZR, rn, imm)
}

// ---------------------------------------------------------------------------
// Move wide
// ---------------------------------------------------------------------------

fn move_wide(base: u32, rd: Reg, imm16: u16, hw: u8) -> u32 {
    base | ((hw as u32) << 21) | ((imm16 as u32) << 5) | rd.index()
}

/// MOVZ with a 16-bit immediate at halfword `hw` (0-3).
pub fn emit_movz_64(rd: Reg, imm16: u16, hw: u8) -> u32 {
    debug_assert!(hw < 4);
    move_wide(0xD280_0000, rd, imm16, hw)
}

/// MOVZ, 32-bit form; `hw` is 0 or 1.
pub fn emit_movz_32(rd: Reg, imm16: u16, hw: u8) -> u32 {
    debug_assert!(hw < 2);
    move_wide(0x5280_0000, rd, imm16, hw)
}

pub fn emit_movn_64(rd: Reg, imm16: u16, hw: u8) -> u32 {
    debug_assert!(hw < 4);
    move_wide(0x9280_0000, rd, imm16, hw)
}

pub fn emit_movn_32(rd: Reg, imm16: u16, hw: u8) -> u32 {
    debug_assert!(hw < 2);
    move_wide(0x1280_0000, rd, imm16, hw)
}

pub fn emit_movk_64(rd: Reg, imm16: u16, hw: u8) -> u32 {
    debug_assert!(hw < 4);
    move_wide(0xF280_0000, rd, imm16, hw)
}

pub fn emit_movk_32(rd: Reg, imm16: u16, hw: u8) -> u32 {
    debug_assert!(hw < 2);
    move_wide(0x7280_0000, rd, imm16, hw)
}

/// Load an arbitrary 64-bit immediate in the minimum number of
/// instructions. Tries, in order: a single logical ORR from the zero
/// register, a single MOVN when every halfword but one is all-ones,
/// a MOVZ/MOVK sequence, or a MOVN/MOVK sequence when all-ones
/// halfwords outnumber zero ones.
pub fn emit_load_immediate_64(rd: Reg, value: u64) -> Vec<u32> {
    let halves: [u16; 4] = [
        value as u16,
        (value >> 16) as u16,
        (value >> 32) as u16,
        (value >> 48) as u16,
    ];
    load_immediate(rd, &halves, |imm| emit_orr_imm_64(rd, Reg::ZR, imm as u64), true)
}

/// 32-bit companion of [`emit_load_immediate_64`].
pub fn emit_load_immediate_32(rd: Reg, value: u32) -> Vec<u32> {
    let halves: [u16; 2] = [value as u16, (value >> 16) as u16];
    load_immediate(rd, &halves, |imm| emit_orr_imm_32(rd, Reg::ZR, imm as u32), false)
}

fn load_immediate(
    rd: Reg,
    halves: &[u16],
    try_logical: impl Fn(u64) -> Option<u32>,
    wide: bool,
) -> Vec<u32> {
    let value = halves
        .iter()
        .enumerate()
        .fold(0u64, |acc, (i, &h)| acc | (h as u64) << (16 * i));

    if let Some(word) = try_logical(value) {
        return vec![word];
    }

    let zeros = halves.iter().filter(|&&h| h == 0).count();
    let ones = halves.iter().filter(|&&h| h == 0xFFFF).count();

    let movz = |imm: u16, hw: u8| if wide { emit_movz_64(rd, imm, hw) } else { emit_movz_32(rd, imm, hw) };
    let movn = |imm: u16, hw: u8| if wide { emit_movn_64(rd, imm, hw) } else { emit_movn_32(rd, imm, hw) };
    let movk = |imm: u16, hw: u8| if wide { emit_movk_64(rd, imm, hw) } else { emit_movk_32(rd, imm, hw) };

    // A single MOVN covers the all-ones value and any value with
    // exactly one non-ones halfword.
    if ones >= halves.len() - 1 {
        let (hw, &half) = halves
            .iter()
            .enumerate()
            .find(|(_, &h)| h != 0xFFFF)
            .unwrap_or((0, &0xFFFF));
        return vec![movn(!half, hw as u8)];
    }

    let mut words = Vec::new();
    if ones > zeros {
        // MOVN seeds the ones; MOVK patches every non-ones halfword.
        let mut seeded = false;
        for (hw, &half) in halves.iter().enumerate() {
            if half == 0xFFFF {
                continue;
            }
            if !seeded {
                words.push(movn(!half, hw as u8));
                seeded = true;
            } else {
                words.push(movk(half, hw as u8));
            }
        }
    } else {
        let mut seeded = false;
        for (hw, &half) in halves.iter().enumerate() {
            if half == 0 {
                continue;
            }
            if !seeded {
                words.push(movz(half, hw as u8));
                seeded = true;
            } else {
                words.push(movk(half, hw as u8));
            }
        }
        if !seeded {
            words.push(movz(0, 0));
        }
    }
    words
}

// ---------------------------------------------------------------------------
// Conditional select
// ---------------------------------------------------------------------------

fn csel_family(base: u32, rd: Reg, rn: Reg, rm: Reg, cond: Cond) -> u32 {
    base | (rm.index() << 16) | (cond.bits() << 12) | rd_rn(rd, rn)
}

pub fn emit_csel_64(rd: Reg, rn: Reg, rm: Reg, cond: Cond) -> u32 {
    csel_family(0x9A80_0000, rd, rn, rm, cond)
}

pub fn emit_csel_32(rd: Reg, rn: Reg, rm: Reg, cond: Cond) -> u32 {
    csel_family(0x1A80_0000, rd, rn, rm, cond)
}

pub fn emit_csinc_64(rd: Reg, rn: Reg, rm: Reg, cond: Cond) -> u32 {
    csel_family(0x9A80_0400, rd, rn, rm, cond)
}

pub fn emit_csinc_32(rd: Reg, rn: Reg, rm: Reg, cond: Cond) -> u32 {
    csel_family(0x1A80_0400, rd, rn, rm, cond)
}

pub fn emit_csinv_64(rd: Reg, rn: Reg, rm: Reg, cond: Cond) -> u32 {
    csel_family(0xDA80_0000, rd, rn, rm, cond)
}

pub fn emit_csinv_32(rd: Reg, rn: Reg, rm: Reg, cond: Cond) -> u32 {
    csel_family(0x5A80_0000, rd, rn, rm, cond)
}

pub fn emit_csneg_64(rd: Reg, rn: Reg, rm: Reg, cond: Cond) -> u32 {
    csel_family(0xDA80_0400, rd, rn, rm, cond)
}

pub fn emit_csneg_32(rd: Reg, rn: Reg, rm: Reg, cond: Cond) -> u32 {
    csel_family(0x5A80_0400, rd, rn, rm, cond)
}

/// CSET: set rd to 1 when the condition holds. Alias of CSINC with both
/// sources zero and the condition inverted.
pub fn emit_cset_64(rd: Reg, cond: Cond) -> u32 {
    emit_csinc_64(rd, Reg::ZR, Reg::ZR, cond.invert())
}

pub fn emit_cset_32(rd: Reg, cond: Cond) -> u32 {
    emit_csinc_32(rd, Reg::ZR, Reg::ZR, cond.invert())
}

/// CSETM: set rd to all-ones when the condition holds.
pub fn emit_csetm_64(rd: Reg, cond: Cond) -> u32 {
    emit_csinv_64(rd, Reg::ZR, Reg::ZR, cond.invert())
}

/// CINC: rd = cond ? rn + 1 : rn.
pub fn emit_cinc_64(rd: Reg, rn: Reg, cond: Cond) -> u32 {
    emit_csinc_64(rd, rn, rn, cond.invert())
}

/// CINV: rd = cond ? !rn : rn.
pub fn emit_cinv_64(rd: Reg, rn: Reg, cond: Cond) -> u32 {
    emit_csinv_64(rd, rn, rn, cond.invert())
}

/// CNEG: rd = cond ? -rn : rn.
pub fn emit_cneg_64(rd: Reg, rn: Reg, cond: Cond) -> u32 {
    emit_csneg_64(rd, rn, rn, cond.invert())
}

// ---------------------------------------------------------------------------
// Bitfield
// ---------------------------------------------------------------------------

fn bitfield_64(base: u32, rd: Reg, rn: Reg, immr: u32, imms: u32) -> u32 {
    // 64-bit bitfield forms carry N = 1.
    base | (1 << 22) | (immr << 16) | (imms << 10) | rd_rn(rd, rn)
}

fn bitfield_32(base: u32, rd: Reg, rn: Reg, immr: u32, imms: u32) -> u32 {
    base | (immr << 16) | (imms << 10) | rd_rn(rd, rn)
}

pub fn emit_sbfm_64(rd: Reg, rn: Reg, immr: u32, imms: u32) -> u32 {
    bitfield_64(0x9300_0000, rd, rn, immr, imms)
}

pub fn emit_sbfm_32(rd: Reg, rn: Reg, immr: u32, imms: u32) -> u32 {
    bitfield_32(0x1300_0000, rd, rn, immr, imms)
}

pub fn emit_bfm_64(rd: Reg, rn: Reg, immr: u32, imms: u32) -> u32 {
    bitfield_64(0xB300_0000, rd, rn, immr, imms)
}

pub fn emit_bfm_32(rd: Reg, rn: Reg, immr: u32, imms: u32) -> u32 {
    bitfield_32(0x3300_0000, rd, rn, immr, imms)
}

pub fn emit_ubfm_64(rd: Reg, rn: Reg, immr: u32, imms: u32) -> u32 {
    bitfield_64(0xD300_0000, rd, rn, immr, imms)
}

pub fn emit_ubfm_32(rd: Reg, rn: Reg, immr: u32, imms: u32) -> u32 {
    bitfield_32(0x5300_0000, rd, rn, immr, imms)
}

/// UBFX: extract `width` bits starting at `lsb`, zero-extended.
pub fn emit_ubfx_64(rd: Reg, rn: Reg, lsb: u32, width: u32) -> u32 {
    debug_assert!(width >= 1 && lsb + width <= 64);
    emit_ubfm_64(rd, rn, lsb, lsb + width - 1)
}

pub fn emit_ubfx_32(rd: Reg, rn: Reg, lsb: u32, width: u32) -> u32 {
    debug_assert!(width >= 1 && lsb + width <= 32);
    emit_ubfm_32(rd, rn, lsb, lsb + width - 1)
}

/// SBFX: extract `width` bits starting at `lsb`, sign-extended.
pub fn emit_sbfx_64(rd: Reg, rn: Reg, lsb: u32, width: u32) -> u32 {
    debug_assert!(width >= 1 && lsb + width <= 64);
    emit_sbfm_64(rd, rn, lsb, lsb + width - 1)
}

pub fn emit_sbfx_32(rd: Reg, rn: Reg, lsb: u32, width: u32) -> u32 {
    debug_assert!(width >= 1 && lsb + width <= 32);
    emit_sbfm_32(rd, rn, lsb, lsb + width - 1)
}

/// BFI: insert the low `width` bits of rn at `lsb`.
pub fn emit_bfi_64(rd: Reg, rn: Reg, lsb: u32, width: u32) -> u32 {
    debug_assert!(width >= 1 && lsb + width <= 64);
    emit_bfm_64(rd, rn, (64 - lsb) & 63, width - 1)
}

pub fn emit_bfi_32(rd: Reg, rn: Reg, lsb: u32, width: u32) -> u32 {
    debug_assert!(width >= 1 && lsb + width <= 32);
    emit_bfm_32(rd, rn, (32 - lsb) & 31, width - 1)
}

/// BFXIL: extract `width` bits at `lsb` of rn into the low bits of rd.
pub fn emit_bfxil_64(rd: Reg, rn: Reg, lsb: u32, width: u32) -> u32 {
    debug_assert!(width >= 1 && lsb + width <= 64);
    emit_bfm_64(rd, rn, lsb, lsb + width - 1)
}

pub fn emit_lsl_imm_64(rd: Reg, rn: Reg, shift: u32) -> u32 {
    debug_assert!(shift < 64);
    emit_ubfm_64(rd, rn, (64 - shift) & 63, 63 - shift)
}

pub fn emit_lsl_imm_32(rd: Reg, rn: Reg, shift: u32) -> u32 {
    debug_assert!(shift < 32);
    emit_ubfm_32(rd, rn, (32 - shift) & 31, 31 - shift)
}

pub fn emit_lsr_imm_64(rd: Reg, rn: Reg, shift: u32) -> u32 {
    debug_assert!(shift < 64);
    emit_ubfm_64(rd, rn, shift, 63)
}

pub fn emit_lsr_imm_32(rd: Reg, rn: Reg, shift: u32) -> u32 {
    debug_assert!(shift < 32);
    emit_ubfm_32(rd, rn, shift, 31)
}

pub fn emit_asr_imm_64(rd: Reg, rn: Reg, shift: u32) -> u32 {
    debug_assert!(shift < 64);
    emit_sbfm_64(rd, rn, shift, 63)
}

pub fn emit_asr_imm_32(rd: Reg, rn: Reg, shift: u32) -> u32 {
    debug_assert!(shift < 32);
    emit_sbfm_32(rd, rn, shift, 31)
}

/// EXTR; ROR with an immediate is EXTR with both sources equal.
pub fn emit_extr_64(rd: Reg, rn: Reg, rm: Reg, lsb: u32) -> u32 {
    debug_assert!(lsb < 64);
    0x93C0_0000 | (rm.index() << 16) | (lsb << 10) | rd_rn(rd, rn)
}

pub fn emit_ror_imm_64(rd: Reg, rn: Reg, shift: u32) -> u32 {
    emit_extr_64(rd, rn, rn, shift)
}

pub fn emit_sxtb_64(rd: Reg, rn: Reg) -> u32 {
    emit_sbfm_64(rd, rn, 0, 7)
}

pub fn emit_sxth_64(rd: Reg, rn: Reg) -> u32 {
    emit_sbfm_64(rd, rn, 0, 15)
}

pub fn emit_sxtw(rd: Reg, rn: Reg) -> u32 {
    emit_sbfm_64(rd, rn, 0, 31)
}

/// UXTB is a 32-bit UBFM; the upper word clears implicitly.
pub fn emit_uxtb(rd: Reg, rn: Reg) -> u32 {
    emit_ubfm_32(rd, rn, 0, 7)
}

pub fn emit_uxth(rd: Reg, rn: Reg) -> u32 {
    emit_ubfm_32(rd, rn, 0, 15)
}

// ---------------------------------------------------------------------------
// PC-relative address formation
// ---------------------------------------------------------------------------

/// ADR: form a byte address within +/-1 MiB of the instruction.
pub fn emit_adr(rd: Reg, byte_offset: i64) -> Option<u32> {
    if !(-(1 << 20)..(1 << 20)).contains(&byte_offset) {
        return None;
    }
    let imm = byte_offset as u32 & 0x1F_FFFF;
    Some(0x1000_0000 | ((imm & 3) << 29) | ((imm >> 2) << 5) | rd.index())
}

/// ADRP: form a 4 KiB page address within +/-4 GiB.
pub fn emit_adrp(rd: Reg, page_offset: i64) -> Option<u32> {
    if !(-(1 << 20)..(1 << 20)).contains(&page_offset) {
        return None;
    }
    let imm = page_offset as u32 & 0x1F_FFFF;
    Some(0x9000_0000 | ((imm & 3) << 29) | ((imm >> 2) << 5) | rd.index())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{reg_extended, reg_only, reg_shifted};

    #[test]
    fn test_add_register() {
        assert_eq!(
            emit_add_register_64(Reg::X0, Reg::X1, reg_only(Reg::X2)),
            0x8B020020
        );
        assert_eq!(
            emit_add_register_32(Reg::X1, Reg::X2, reg_only(Reg::X3)),
            0x0B030041
        );
        assert_eq!(
            emit_sub_register_64(Reg::X4, Reg::X5, reg_only(Reg::X6)),
            0xCB0600A4
        );
    }

    #[test]
    fn test_add_shifted_and_extended() {
        assert_eq!(
            emit_add_register_64(Reg::X0, Reg::X1, reg_shifted(Reg::X2, Shift::Lsl, 4)),
            0x8B021020
        );
        assert_eq!(
            emit_add_register_64(Reg::X0, Reg::X1, reg_extended(Reg::X2, Extend::Uxtw, 0)),
            0x8B224020
        );
    }

    #[test]
    fn test_logical_register() {
        assert_eq!(
            emit_and_register_64(Reg::X0, Reg::X1, reg_only(Reg::X2)),
            0x8A020020
        );
        assert_eq!(
            emit_orr_register_64(Reg::X0, Reg::X1, reg_only(Reg::X2)),
            0xAA020020
        );
        assert_eq!(
            emit_eor_register_64(Reg::X0, Reg::X1, reg_only(Reg::X2)),
            0xCA020020
        );
        assert_eq!(
            emit_bic_register_64(Reg::X0, Reg::X1, reg_only(Reg::X2)),
            0x8A220020
        );
        assert_eq!(emit_mov_register_64(Reg::X0, Reg::X1), 0xAA0103E0);
        assert_eq!(emit_tst_register_64(Reg::X0, reg_only(Reg::X1)), 0xEA01001F);
    }

    #[test]
    fn test_multiply_divide() {
        assert_eq!(emit_madd_64(Reg::X0, Reg::X1, Reg::X2, Reg::X3), 0x9B020C20);
        assert_eq!(emit_mul_64(Reg::X0, Reg::X1, Reg::X2), 0x9B027C20);
        assert_eq!(emit_sdiv_64(Reg::X0, Reg::X1, Reg::X2), 0x9AC20C20);
        assert_eq!(emit_udiv_64(Reg::X0, Reg::X1, Reg::X2), 0x9AC20820);
        assert_eq!(emit_smulh(Reg::X0, Reg::X1, Reg::X2), 0x9B427C20);
        assert_eq!(emit_umulh(Reg::X0, Reg::X1, Reg::X2), 0x9BC27C20);
    }

    #[test]
    fn test_add_imm_boundaries() {
        // 4095 fits unshifted, 4096 needs LSL #12, 4097 cannot encode.
        assert_eq!(
            emit_add_imm_64(Reg::X0, Reg::X1, 4095),
            Some(0x9100_0000 | (4095 << 10) | 0x20)
        );
        assert_eq!(
            emit_add_imm_64(Reg::X0, Reg::X1, 4096),
            Some(0x9140_0420)
        );
        assert_eq!(emit_add_imm_64(Reg::X0, Reg::X1, 4097), None);
    }

    #[test]
    fn test_add_imm_auto_negates() {
        // A negative addend becomes the SUB encoding.
        assert_eq!(
            emit_add_imm_64(Reg::X0, Reg::X1, -42),
            Some(0xD100_A820)
        );
        assert_eq!(
            emit_sub_imm_64(Reg::X0, Reg::X1, -42),
            Some(0x9100_A820)
        );
    }

    #[test]
    fn test_logical_imm() {
        assert_eq!(
            emit_orr_imm_64(Reg::X0, Reg::ZR, 0xFF),
            Some(0xB2401FE0)
        );
        assert_eq!(emit_and_imm_64(Reg::X0, Reg::X1, 0xABCD), None);
    }

    #[test]
    fn test_move_wide() {
        assert_eq!(emit_movz_64(Reg::X0, 0, 0), 0xD2800000);
        assert_eq!(emit_movz_64(Reg::X0, 42, 0), 0xD2800540);
        assert_eq!(emit_movn_64(Reg::X0, 0, 0), 0x92800000);
        assert_eq!(emit_movk_64(Reg::X0, 1, 1), 0xF2A00020);
    }

    #[test]
    fn test_load_immediate_zero() {
        assert_eq!(emit_load_immediate_64(Reg::X0, 0), vec![0xD2800000]);
    }

    #[test]
    fn test_load_immediate_logical() {
        // A repeating-pattern value takes the single-ORR path.
        assert_eq!(
            emit_load_immediate_64(Reg::X0, 0xFF),
            vec![0xB2401FE0]
        );
    }

    #[test]
    fn test_load_immediate_movn() {
        // -1 is a bare MOVN; -2 is MOVN of 1.
        assert_eq!(
            emit_load_immediate_64(Reg::X0, u64::MAX),
            vec![emit_movn_64(Reg::X0, 0, 0)]
        );
        assert_eq!(
            emit_load_immediate_64(Reg::X0, (-2i64) as u64),
            vec![emit_movn_64(Reg::X0, 1, 0)]
        );
    }

    #[test]
    fn test_load_immediate_sequences() {
        // 0x1_0000_002A: MOVZ low + MOVK third halfword.
        assert_eq!(
            emit_load_immediate_64(Reg::X0, 0x1_0000_002A),
            vec![emit_movz_64(Reg::X0, 0x2A, 0), emit_movk_64(Reg::X0, 1, 2)]
        );
        // Mostly-ones value prefers the MOVN seed.
        assert_eq!(
            emit_load_immediate_64(Reg::X0, 0xFFFF_FFFF_1234_FFFF),
            vec![emit_movn_64(Reg::X0, !0x1234, 1)]
        );
    }

    #[test]
    fn test_csel_family() {
        assert_eq!(
            emit_csel_64(Reg::X0, Reg::X1, Reg::X2, Cond::Eq),
            0x9A820020
        );
        assert_eq!(emit_cset_64(Reg::X0, Cond::Eq), 0x9A9F17E0);
    }

    #[test]
    fn test_bitfield_aliases() {
        assert_eq!(emit_ubfx_64(Reg::X0, Reg::X1, 8, 8), 0xD3483C20);
        assert_eq!(emit_lsl_imm_64(Reg::X0, Reg::X1, 4), 0xD37CEC20);
        assert_eq!(emit_lsr_imm_64(Reg::X0, Reg::X1, 4), 0xD344FC20);
        assert_eq!(emit_asr_imm_64(Reg::X0, Reg::X1, 4), 0x9344FC20);
        assert_eq!(emit_sxtb_64(Reg::X0, Reg::X1), 0x93401C20);
        assert_eq!(emit_sxtw(Reg::X0, Reg::X1), 0x93407C20);
    }

    #[test]
    fn test_adr() {
        assert_eq!(emit_adr(Reg::X0, 0), Some(0x10000000));
        assert_eq!(emit_adrp(Reg::X0, 0), Some(0x90000000));
        assert_eq!(emit_adr(Reg::X0, 1 << 20), None);
        // imm21 split: low two bits to 30:29, the rest to 23:5.
        assert_eq!(emit_adr(Reg::X1, 8), Some(0x1000_0041));
    }
}
