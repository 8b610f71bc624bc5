//! NEON (AdvSIMD) encodings: integer and floating-point arithmetic,
//! permutes, reductions, lane moves, immediate moves, SIMD loads and
//! stores, and the AES crypto extension.

use super::{Arrangement, Reg, VReg};

fn q30(arr: Arrangement) -> u32 {
    arr.q() << 30
}

fn size22(arr: Arrangement) -> u32 {
    arr.size() << 22
}

fn vd_vn(rd: VReg, rn: VReg) -> u32 {
    (rn.index() << 5) | rd.index()
}

// Three-same vector form: Q at 30, size at 23:22, Rm at 20:16.
fn v3same(base: u32, arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    debug_assert!(arr.is_vector());
    base | q30(arr) | size22(arr) | (rm.index() << 16) | vd_vn(rd, rn)
}

// Two-register miscellaneous vector form.
fn v2misc(base: u32, arr: Arrangement, rd: VReg, rn: VReg) -> u32 {
    debug_assert!(arr.is_vector());
    base | q30(arr) | size22(arr) | vd_vn(rd, rn)
}

// ---------------------------------------------------------------------------
// Integer arithmetic and logical
// ---------------------------------------------------------------------------

pub fn emit_vadd(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    v3same(0x0E20_8400, arr, rd, rn, rm)
}

pub fn emit_vsub(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    v3same(0x2E20_8400, arr, rd, rn, rm)
}

/// Element-wise multiply; byte/half/word elements only.
pub fn emit_vmul(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    debug_assert!(arr.size() < 3);
    v3same(0x0E20_9C00, arr, rd, rn, rm)
}

// The bitwise group encodes its operand width in the size field, so it
// only distinguishes 64 vs 128 bits via Q; byte arrangements are the
// canonical spelling.
pub fn emit_vand(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    debug_assert!(arr.size() == 0);
    v3same(0x0E20_1C00, arr, rd, rn, rm)
}

pub fn emit_vorr(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    debug_assert!(arr.size() == 0);
    0x0EA0_1C00 | q30(arr) | (rm.index() << 16) | vd_vn(rd, rn)
}

pub fn emit_veor(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    debug_assert!(arr.size() == 0);
    v3same(0x2E20_1C00, arr, rd, rn, rm)
}

pub fn emit_vbic(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    debug_assert!(arr.size() == 0);
    0x0E60_1C00 | q30(arr) | (rm.index() << 16) | vd_vn(rd, rn)
}

pub fn emit_vorn(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    debug_assert!(arr.size() == 0);
    0x0EE0_1C00 | q30(arr) | (rm.index() << 16) | vd_vn(rd, rn)
}

/// Bitwise select: rd = (rd & rn) | (!rd & rm).
pub fn emit_vbsl(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    debug_assert!(arr.size() == 0);
    0x2E60_1C00 | q30(arr) | (rm.index() << 16) | vd_vn(rd, rn)
}

pub fn emit_vnot(arr: Arrangement, rd: VReg, rn: VReg) -> u32 {
    debug_assert!(arr.size() == 0);
    0x2E20_5800 | q30(arr) | vd_vn(rd, rn)
}

pub fn emit_sqadd(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    v3same(0x0E20_0C00, arr, rd, rn, rm)
}

pub fn emit_uqadd(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    v3same(0x2E20_0C00, arr, rd, rn, rm)
}

pub fn emit_sqsub(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    v3same(0x0E20_2C00, arr, rd, rn, rm)
}

pub fn emit_uqsub(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    v3same(0x2E20_2C00, arr, rd, rn, rm)
}

pub fn emit_smax(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    v3same(0x0E20_6400, arr, rd, rn, rm)
}

pub fn emit_smin(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    v3same(0x0E20_6C00, arr, rd, rn, rm)
}

pub fn emit_umax(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    v3same(0x2E20_6400, arr, rd, rn, rm)
}

pub fn emit_umin(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    v3same(0x2E20_6C00, arr, rd, rn, rm)
}

// ---------------------------------------------------------------------------
// Integer comparisons
// ---------------------------------------------------------------------------

pub fn emit_cmeq(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    v3same(0x2E20_8C00, arr, rd, rn, rm)
}

pub fn emit_cmgt(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    v3same(0x0E20_3400, arr, rd, rn, rm)
}

pub fn emit_cmge(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    v3same(0x0E20_3C00, arr, rd, rn, rm)
}

pub fn emit_cmhi(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    v3same(0x2E20_3400, arr, rd, rn, rm)
}

pub fn emit_cmhs(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    v3same(0x2E20_3C00, arr, rd, rn, rm)
}

pub fn emit_cmtst(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    v3same(0x0E20_8C00, arr, rd, rn, rm)
}

pub fn emit_cmeq_zero(arr: Arrangement, rd: VReg, rn: VReg) -> u32 {
    v2misc(0x0E20_9800, arr, rd, rn)
}

pub fn emit_cmgt_zero(arr: Arrangement, rd: VReg, rn: VReg) -> u32 {
    v2misc(0x0E20_8800, arr, rd, rn)
}

pub fn emit_cmge_zero(arr: Arrangement, rd: VReg, rn: VReg) -> u32 {
    v2misc(0x2E20_8800, arr, rd, rn)
}

pub fn emit_cmlt_zero(arr: Arrangement, rd: VReg, rn: VReg) -> u32 {
    v2misc(0x0E20_A800, arr, rd, rn)
}

pub fn emit_cmle_zero(arr: Arrangement, rd: VReg, rn: VReg) -> u32 {
    v2misc(0x2E20_9800, arr, rd, rn)
}

// ---------------------------------------------------------------------------
// Pairwise and across-lane reductions
// ---------------------------------------------------------------------------

pub fn emit_addp(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    v3same(0x0E20_BC00, arr, rd, rn, rm)
}

pub fn emit_smaxp(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    v3same(0x0E20_A400, arr, rd, rn, rm)
}

pub fn emit_sminp(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    v3same(0x0E20_AC00, arr, rd, rn, rm)
}

pub fn emit_umaxp(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    v3same(0x2E20_A400, arr, rd, rn, rm)
}

pub fn emit_uminp(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    v3same(0x2E20_AC00, arr, rd, rn, rm)
}

/// Sum across lanes into a scalar.
pub fn emit_addv(arr: Arrangement, rd: VReg, rn: VReg) -> u32 {
    debug_assert!(arr.size() < 3);
    v2misc(0x0E31_B800, arr, rd, rn)
}

/// Widening sum across lanes.
pub fn emit_saddlv(arr: Arrangement, rd: VReg, rn: VReg) -> u32 {
    v2misc(0x0E30_3800, arr, rd, rn)
}

pub fn emit_uaddlv(arr: Arrangement, rd: VReg, rn: VReg) -> u32 {
    v2misc(0x2E30_3800, arr, rd, rn)
}

pub fn emit_smaxv(arr: Arrangement, rd: VReg, rn: VReg) -> u32 {
    v2misc(0x0E30_A800, arr, rd, rn)
}

pub fn emit_sminv(arr: Arrangement, rd: VReg, rn: VReg) -> u32 {
    v2misc(0x0E31_A800, arr, rd, rn)
}

pub fn emit_umaxv(arr: Arrangement, rd: VReg, rn: VReg) -> u32 {
    v2misc(0x2E30_A800, arr, rd, rn)
}

pub fn emit_uminv(arr: Arrangement, rd: VReg, rn: VReg) -> u32 {
    v2misc(0x2E31_A800, arr, rd, rn)
}

// ---------------------------------------------------------------------------
// Permutes
// ---------------------------------------------------------------------------

pub fn emit_zip1(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    v3same(0x0E00_3800, arr, rd, rn, rm)
}

pub fn emit_zip2(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    v3same(0x0E00_7800, arr, rd, rn, rm)
}

pub fn emit_uzp1(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    v3same(0x0E00_1800, arr, rd, rn, rm)
}

pub fn emit_uzp2(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    v3same(0x0E00_5800, arr, rd, rn, rm)
}

pub fn emit_trn1(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    v3same(0x0E00_2800, arr, rd, rn, rm)
}

pub fn emit_trn2(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    v3same(0x0E00_6800, arr, rd, rn, rm)
}

// ---------------------------------------------------------------------------
// Widening, narrowing
// ---------------------------------------------------------------------------

// The long forms take the source arrangement; a 128-bit source selects
// the second-half (_2) variant.

pub fn emit_saddl(src: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    debug_assert!(src.size() < 3);
    v3same(0x0E20_0000, src, rd, rn, rm)
}

pub fn emit_uaddl(src: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    debug_assert!(src.size() < 3);
    v3same(0x2E20_0000, src, rd, rn, rm)
}

pub fn emit_ssubl(src: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    debug_assert!(src.size() < 3);
    v3same(0x0E20_2000, src, rd, rn, rm)
}

pub fn emit_usubl(src: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    debug_assert!(src.size() < 3);
    v3same(0x2E20_2000, src, rd, rn, rm)
}

pub fn emit_smull_vec(src: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    debug_assert!(src.size() < 3);
    v3same(0x0E20_C000, src, rd, rn, rm)
}

pub fn emit_umull_vec(src: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    debug_assert!(src.size() < 3);
    v3same(0x2E20_C000, src, rd, rn, rm)
}

// The narrow forms take the destination arrangement; a 128-bit
// destination selects the second-half (_2) variant.

pub fn emit_xtn(dst: Arrangement, rd: VReg, rn: VReg) -> u32 {
    debug_assert!(dst.size() < 3);
    v2misc(0x0E21_2800, dst, rd, rn)
}

pub fn emit_sqxtn(dst: Arrangement, rd: VReg, rn: VReg) -> u32 {
    debug_assert!(dst.size() < 3);
    v2misc(0x0E21_4800, dst, rd, rn)
}

pub fn emit_uqxtn(dst: Arrangement, rd: VReg, rn: VReg) -> u32 {
    debug_assert!(dst.size() < 3);
    v2misc(0x2E21_4800, dst, rd, rn)
}

// ---------------------------------------------------------------------------
// Shift by immediate
// ---------------------------------------------------------------------------

// The shift-immediate group encodes the element width and shift amount
// together in the 7-bit immh:immb field: esize + shift for left shifts,
// 2*esize - shift for right shifts.

fn element_bits(arr: Arrangement) -> u32 {
    8 << arr.size()
}

pub fn emit_shl_imm(arr: Arrangement, rd: VReg, rn: VReg, shift: u32) -> Option<u32> {
    debug_assert!(arr.is_vector());
    let esize = element_bits(arr);
    if shift >= esize {
        return None;
    }
    Some(0x0F00_5400 | q30(arr) | ((esize + shift) << 16) | vd_vn(rd, rn))
}

pub fn emit_sshr_imm(arr: Arrangement, rd: VReg, rn: VReg, shift: u32) -> Option<u32> {
    debug_assert!(arr.is_vector());
    let esize = element_bits(arr);
    if shift == 0 || shift > esize {
        return None;
    }
    Some(0x0F00_0400 | q30(arr) | ((2 * esize - shift) << 16) | vd_vn(rd, rn))
}

pub fn emit_ushr_imm(arr: Arrangement, rd: VReg, rn: VReg, shift: u32) -> Option<u32> {
    debug_assert!(arr.is_vector());
    let esize = element_bits(arr);
    if shift == 0 || shift > esize {
        return None;
    }
    Some(0x2F00_0400 | q30(arr) | ((2 * esize - shift) << 16) | vd_vn(rd, rn))
}

/// Signed shift-left-long from the source arrangement; a 128-bit source
/// selects the second-half variant.
pub fn emit_sshll(src: Arrangement, rd: VReg, rn: VReg, shift: u32) -> Option<u32> {
    debug_assert!(src.is_vector() && src.size() < 3);
    let esize = element_bits(src);
    if shift >= esize {
        return None;
    }
    Some(0x0F00_A400 | q30(src) | ((esize + shift) << 16) | vd_vn(rd, rn))
}

pub fn emit_ushll(src: Arrangement, rd: VReg, rn: VReg, shift: u32) -> Option<u32> {
    debug_assert!(src.is_vector() && src.size() < 3);
    let esize = element_bits(src);
    if shift >= esize {
        return None;
    }
    Some(0x2F00_A400 | q30(src) | ((esize + shift) << 16) | vd_vn(rd, rn))
}

/// SXTL is SSHLL with a zero shift.
pub fn emit_sxtl(src: Arrangement, rd: VReg, rn: VReg) -> u32 {
    emit_sshll(src, rd, rn, 0).unwrap()
}

/// UXTL is USHLL with a zero shift.
pub fn emit_uxtl(src: Arrangement, rd: VReg, rn: VReg) -> u32 {
    emit_ushll(src, rd, rn, 0).unwrap()
}

// ---------------------------------------------------------------------------
// Lane moves
// ---------------------------------------------------------------------------

// Lane selectors encode as imm5 = (index << 1 | 1) << size.
fn lane_imm5(arr: Arrangement, index: u32) -> Option<u32> {
    let lanes = (16 >> arr.size()) as u32;
    if index >= lanes {
        return None;
    }
    Some(((index << 1) | 1) << arr.size())
}

/// Duplicate one element of rn across the destination vector. The
/// arrangement is the destination shape; the index selects the source
/// lane and must be within the 128-bit register's lane count.
pub fn emit_dup_element(arr: Arrangement, rd: VReg, rn: VReg, index: u32) -> Option<u32> {
    debug_assert!(arr.is_vector());
    let imm5 = lane_imm5(arr, index)?;
    Some(0x0E00_0400 | q30(arr) | (imm5 << 16) | vd_vn(rd, rn))
}

/// Duplicate a general register across the destination vector.
pub fn emit_dup_general(arr: Arrangement, rd: VReg, rn: Reg) -> u32 {
    debug_assert!(arr.is_vector());
    let imm5 = 1u32 << arr.size();
    0x0E00_0C00 | q30(arr) | (imm5 << 16) | (rn.index() << 5) | rd.index()
}

/// Insert a general register into one lane.
pub fn emit_ins_general(arr: Arrangement, rd: VReg, index: u32, rn: Reg) -> Option<u32> {
    let imm5 = lane_imm5(arr, index)?;
    Some(0x4E00_1C00 | (imm5 << 16) | (rn.index() << 5) | rd.index())
}

/// Element-to-element insert.
pub fn emit_ins_element(
    arr: Arrangement,
    rd: VReg,
    dst_index: u32,
    rn: VReg,
    src_index: u32,
) -> Option<u32> {
    let imm5 = lane_imm5(arr, dst_index)?;
    let lanes = (16 >> arr.size()) as u32;
    if src_index >= lanes {
        return None;
    }
    let imm4 = src_index << arr.size();
    Some(0x6E00_0400 | (imm5 << 16) | (imm4 << 11) | vd_vn(rd, rn))
}

/// Signed element extract to a general register. `wide` selects a
/// 64-bit destination (byte/half/word lanes) over 32-bit (byte/half).
pub fn emit_smov(arr: Arrangement, rd: Reg, rn: VReg, index: u32, wide: bool) -> Option<u32> {
    debug_assert!(if wide { arr.size() < 3 } else { arr.size() < 2 });
    let imm5 = lane_imm5(arr, index)?;
    let q = u32::from(wide) << 30;
    Some(0x0E00_2C00 | q | (imm5 << 16) | (rn.index() << 5) | rd.index())
}

/// Unsigned element extract to a general register. Doubleword lanes
/// extract to 64 bits, everything else to 32.
pub fn emit_umov(arr: Arrangement, rd: Reg, rn: VReg, index: u32) -> Option<u32> {
    let imm5 = lane_imm5(arr, index)?;
    let q = u32::from(arr.size() == 3) << 30;
    Some(0x0E00_3C00 | q | (imm5 << 16) | (rn.index() << 5) | rd.index())
}

// ---------------------------------------------------------------------------
// Immediate moves (MOVI / MVNI)
// ---------------------------------------------------------------------------

/// The op:cmode:imm8 triple of a MOVI/MVNI encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeonImm {
    pub op: u32,
    pub cmode: u32,
    pub imm8: u8,
}

/// Find a MOVI/MVNI encoding for an element value of the arrangement's
/// width, or None if no cmode can express it.
pub fn compute_neon_immediate(value: u64, arr: Arrangement) -> Option<NeonImm> {
    match arr.size() {
        0 => {
            let v = value as u8 as u64;
            (v == value).then_some(NeonImm {
                op: 0,
                cmode: 0b1110,
                imm8: value as u8,
            })
        }
        1 => {
            let v = value as u16;
            if v as u64 != value {
                return None;
            }
            halfword_imm(v, 0).or_else(|| halfword_imm(!v, 1))
        }
        2 => {
            let v = value as u32;
            if v as u64 != value {
                return None;
            }
            word_imm(v, 0).or_else(|| word_imm(!v, 1))
        }
        3 => {
            // Every byte must be 0x00 or 0xFF.
            let mut imm8 = 0u8;
            for byte in 0..8 {
                match (value >> (byte * 8)) as u8 {
                    0xFF => imm8 |= 1 << byte,
                    0x00 => {}
                    _ => return None,
                }
            }
            Some(NeonImm {
                op: 1,
                cmode: 0b1110,
                imm8,
            })
        }
        _ => None,
    }
}

fn halfword_imm(v: u16, op: u32) -> Option<NeonImm> {
    if v & 0xFF00 == 0 {
        Some(NeonImm {
            op,
            cmode: 0b1000,
            imm8: v as u8,
        })
    } else if v & 0x00FF == 0 {
        Some(NeonImm {
            op,
            cmode: 0b1010,
            imm8: (v >> 8) as u8,
        })
    } else {
        None
    }
}

fn word_imm(v: u32, op: u32) -> Option<NeonImm> {
    for (shift, cmode) in [(0u32, 0b0000u32), (8, 0b0010), (16, 0b0100), (24, 0b0110)] {
        if v & !(0xFFu32 << shift) == 0 {
            return Some(NeonImm {
                op,
                cmode,
                imm8: (v >> shift) as u8,
            });
        }
    }
    // MSL forms: a byte shifted in over ones.
    if v & 0xFFFF_00FF == 0x0000_00FF {
        return Some(NeonImm {
            op,
            cmode: 0b1100,
            imm8: (v >> 8) as u8,
        });
    }
    if v & 0xFF00_FFFF == 0x0000_FFFF {
        return Some(NeonImm {
            op,
            cmode: 0b1101,
            imm8: (v >> 16) as u8,
        });
    }
    None
}

/// Vector move immediate. `value` is the element value; returns None
/// when no MOVI/MVNI cmode can express it.
pub fn emit_movi(arr: Arrangement, rd: VReg, value: u64) -> Option<u32> {
    debug_assert!(arr.is_vector());
    let imm = compute_neon_immediate(value, arr)?;
    let abc = (imm.imm8 as u32) >> 5;
    let defgh = (imm.imm8 as u32) & 0x1F;
    Some(
        0x0F00_0400
            | q30(arr)
            | (imm.op << 29)
            | (abc << 16)
            | (imm.cmode << 12)
            | (defgh << 5)
            | rd.index(),
    )
}

// ---------------------------------------------------------------------------
// Floating point
// ---------------------------------------------------------------------------

// Scalar ops place S/D in bit 22; vector ops use Q plus the sz bit.

fn fp_scalar_type(arr: Arrangement) -> u32 {
    debug_assert!(matches!(arr, Arrangement::S | Arrangement::D));
    u32::from(arr == Arrangement::D) << 22
}

fn fp_vector_bits(arr: Arrangement) -> u32 {
    debug_assert!(matches!(
        arr,
        Arrangement::S2 | Arrangement::S4 | Arrangement::D2
    ));
    (arr.q() << 30) | (u32::from(arr.size() == 3) << 22)
}

fn fp_binary(scalar_base: u32, vector_base: u32, arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    if arr.is_vector() {
        vector_base | fp_vector_bits(arr) | (rm.index() << 16) | vd_vn(rd, rn)
    } else {
        scalar_base | fp_scalar_type(arr) | (rm.index() << 16) | vd_vn(rd, rn)
    }
}

pub fn emit_fadd(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    fp_binary(0x1E20_2800, 0x0E20_D400, arr, rd, rn, rm)
}

pub fn emit_fsub(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    fp_binary(0x1E20_3800, 0x0EA0_D400, arr, rd, rn, rm)
}

pub fn emit_fmul(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    fp_binary(0x1E20_0800, 0x2E20_DC00, arr, rd, rn, rm)
}

pub fn emit_fdiv(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    fp_binary(0x1E20_1800, 0x2E20_FC00, arr, rd, rn, rm)
}

pub fn emit_fmax(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    fp_binary(0x1E20_4800, 0x0E20_F400, arr, rd, rn, rm)
}

pub fn emit_fmin(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    fp_binary(0x1E20_5800, 0x0EA0_F400, arr, rd, rn, rm)
}

pub fn emit_fmaxnm(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    fp_binary(0x1E20_6800, 0x0E20_C400, arr, rd, rn, rm)
}

pub fn emit_fminnm(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    fp_binary(0x1E20_7800, 0x0EA0_C400, arr, rd, rn, rm)
}

/// Scalar negated multiply.
pub fn emit_fnmul(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    0x1E20_8800 | fp_scalar_type(arr) | (rm.index() << 16) | vd_vn(rd, rn)
}

/// Vector fused multiply-add.
pub fn emit_fmla(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    0x0E20_CC00 | fp_vector_bits(arr) | (rm.index() << 16) | vd_vn(rd, rn)
}

pub fn emit_fmls(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    0x0EA0_CC00 | fp_vector_bits(arr) | (rm.index() << 16) | vd_vn(rd, rn)
}

fn fp_fma_scalar(base: u32, arr: Arrangement, rd: VReg, rn: VReg, rm: VReg, ra: VReg) -> u32 {
    base | fp_scalar_type(arr) | (rm.index() << 16) | (ra.index() << 10) | vd_vn(rd, rn)
}

pub fn emit_fmadd(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg, ra: VReg) -> u32 {
    fp_fma_scalar(0x1F00_0000, arr, rd, rn, rm, ra)
}

pub fn emit_fmsub(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg, ra: VReg) -> u32 {
    fp_fma_scalar(0x1F00_8000, arr, rd, rn, rm, ra)
}

pub fn emit_fnmadd(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg, ra: VReg) -> u32 {
    fp_fma_scalar(0x1F20_0000, arr, rd, rn, rm, ra)
}

pub fn emit_fnmsub(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg, ra: VReg) -> u32 {
    fp_fma_scalar(0x1F20_8000, arr, rd, rn, rm, ra)
}

fn fp_unary(scalar_base: u32, vector_base: u32, arr: Arrangement, rd: VReg, rn: VReg) -> u32 {
    if arr.is_vector() {
        vector_base | fp_vector_bits(arr) | vd_vn(rd, rn)
    } else {
        scalar_base | fp_scalar_type(arr) | vd_vn(rd, rn)
    }
}

pub fn emit_fabs(arr: Arrangement, rd: VReg, rn: VReg) -> u32 {
    fp_unary(0x1E20_C000, 0x0EA0_F800, arr, rd, rn)
}

pub fn emit_fneg(arr: Arrangement, rd: VReg, rn: VReg) -> u32 {
    fp_unary(0x1E21_4000, 0x2EA0_F800, arr, rd, rn)
}

pub fn emit_fsqrt(arr: Arrangement, rd: VReg, rn: VReg) -> u32 {
    fp_unary(0x1E21_C000, 0x2EA1_F800, arr, rd, rn)
}

/// Scalar register move.
pub fn emit_fmov_reg(arr: Arrangement, rd: VReg, rn: VReg) -> u32 {
    0x1E20_4000 | fp_scalar_type(arr) | vd_vn(rd, rn)
}

/// Widen single to double.
pub fn emit_fcvt_single_to_double(rd: VReg, rn: VReg) -> u32 {
    0x1E22_C000 | vd_vn(rd, rn)
}

/// Narrow double to single.
pub fn emit_fcvt_double_to_single(rd: VReg, rn: VReg) -> u32 {
    0x1E62_4000 | vd_vn(rd, rn)
}

// ---------------------------------------------------------------------------
// Floating-point comparisons
// ---------------------------------------------------------------------------

pub fn emit_fcmp(arr: Arrangement, rn: VReg, rm: VReg) -> u32 {
    0x1E20_2000 | fp_scalar_type(arr) | (rm.index() << 16) | (rn.index() << 5)
}

pub fn emit_fcmp_zero(arr: Arrangement, rn: VReg) -> u32 {
    0x1E20_2008 | fp_scalar_type(arr) | (rn.index() << 5)
}

/// Signalling compare.
pub fn emit_fcmpe(arr: Arrangement, rn: VReg, rm: VReg) -> u32 {
    0x1E20_2010 | fp_scalar_type(arr) | (rm.index() << 16) | (rn.index() << 5)
}

pub fn emit_fcmpe_zero(arr: Arrangement, rn: VReg) -> u32 {
    0x1E20_2018 | fp_scalar_type(arr) | (rn.index() << 5)
}

pub fn emit_fcmeq(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    0x0E20_E400 | fp_vector_bits(arr) | (rm.index() << 16) | vd_vn(rd, rn)
}

pub fn emit_fcmge(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    0x2E20_E400 | fp_vector_bits(arr) | (rm.index() << 16) | vd_vn(rd, rn)
}

pub fn emit_fcmgt(arr: Arrangement, rd: VReg, rn: VReg, rm: VReg) -> u32 {
    0x2EA0_E400 | fp_vector_bits(arr) | (rm.index() << 16) | vd_vn(rd, rn)
}

pub fn emit_fcmeq_zero(arr: Arrangement, rd: VReg, rn: VReg) -> u32 {
    0x0EA0_D800 | fp_vector_bits(arr) | vd_vn(rd, rn)
}

pub fn emit_fcmge_zero(arr: Arrangement, rd: VReg, rn: VReg) -> u32 {
    0x2EA0_C800 | fp_vector_bits(arr) | vd_vn(rd, rn)
}

pub fn emit_fcmgt_zero(arr: Arrangement, rd: VReg, rn: VReg) -> u32 {
    0x0EA0_C800 | fp_vector_bits(arr) | vd_vn(rd, rn)
}

pub fn emit_fcmle_zero(arr: Arrangement, rd: VReg, rn: VReg) -> u32 {
    0x2EA0_D800 | fp_vector_bits(arr) | vd_vn(rd, rn)
}

pub fn emit_fcmlt_zero(arr: Arrangement, rd: VReg, rn: VReg) -> u32 {
    0x0EA0_E800 | fp_vector_bits(arr) | vd_vn(rd, rn)
}

// ---------------------------------------------------------------------------
// Floating-point / integer conversion
// ---------------------------------------------------------------------------

/// Rounding mode for the FCVT* integer-conversion family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FpRound {
    /// Ties away from zero (FCVTA).
    TiesAway,
    /// Toward minus infinity (FCVTM).
    Minus,
    /// Ties to even (FCVTN).
    Nearest,
    /// Toward plus infinity (FCVTP).
    Plus,
    /// Toward zero (FCVTZ).
    Zero,
}

impl FpRound {
    // (rmode, opcode) for the general-register destination form.
    fn general_fields(self) -> (u32, u32) {
        match self {
            FpRound::TiesAway => (0b00, 0b100),
            FpRound::Minus => (0b10, 0b000),
            FpRound::Nearest => (0b00, 0b000),
            FpRound::Plus => (0b01, 0b000),
            FpRound::Zero => (0b11, 0b000),
        }
    }

    // Two-register-misc base for the vector form.
    fn vector_base(self) -> u32 {
        match self {
            FpRound::Nearest => 0x0E21_A800,
            FpRound::Minus => 0x0E21_B800,
            FpRound::TiesAway => 0x0E21_C800,
            FpRound::Plus => 0x0EA1_A800,
            FpRound::Zero => 0x0EA1_B800,
        }
    }
}

/// Convert a scalar float to an integer in a general register.
/// `src` is the S/D source shape; `wide` selects a 64-bit destination.
pub fn emit_fcvt_to_int(
    round: FpRound,
    signed: bool,
    rd: Reg,
    wide: bool,
    src: Arrangement,
    rn: VReg,
) -> u32 {
    let (rmode, opcode) = round.general_fields();
    let opcode = opcode + u32::from(!signed);
    (u32::from(wide) << 31)
        | 0x1E20_0000
        | fp_scalar_type(src)
        | (rmode << 19)
        | (opcode << 16)
        | (rn.index() << 5)
        | rd.index()
}

/// Convert a signed general register to a scalar float.
pub fn emit_scvtf_general(dst: Arrangement, rd: VReg, rn: Reg, wide: bool) -> u32 {
    (u32::from(wide) << 31)
        | 0x1E22_0000
        | fp_scalar_type(dst)
        | (rn.index() << 5)
        | rd.index()
}

/// Convert an unsigned general register to a scalar float.
pub fn emit_ucvtf_general(dst: Arrangement, rd: VReg, rn: Reg, wide: bool) -> u32 {
    (u32::from(wide) << 31)
        | 0x1E23_0000
        | fp_scalar_type(dst)
        | (rn.index() << 5)
        | rd.index()
}

/// Element-wise float-to-integer conversion.
pub fn emit_fcvt_to_int_vector(
    round: FpRound,
    signed: bool,
    arr: Arrangement,
    rd: VReg,
    rn: VReg,
) -> u32 {
    let base = round.vector_base() | (u32::from(!signed) << 29);
    base | fp_vector_bits(arr) | vd_vn(rd, rn)
}

/// Element-wise signed-integer-to-float conversion.
pub fn emit_scvtf_vector(arr: Arrangement, rd: VReg, rn: VReg) -> u32 {
    0x0E21_D800 | fp_vector_bits(arr) | vd_vn(rd, rn)
}

pub fn emit_ucvtf_vector(arr: Arrangement, rd: VReg, rn: VReg) -> u32 {
    0x2E21_D800 | fp_vector_bits(arr) | vd_vn(rd, rn)
}

// ---------------------------------------------------------------------------
// SIMD loads and stores
// ---------------------------------------------------------------------------

// (scaled base, unscaled base, size log2) per scalar shape.
fn fp_mem_bases(arr: Arrangement, load: bool) -> (u32, u32, u32) {
    let (ldr_scaled, ldr_unscaled, size) = match arr {
        Arrangement::B => (0x3D40_0000, 0x3C40_0000, 0),
        Arrangement::H => (0x7D40_0000, 0x7C40_0000, 1),
        Arrangement::S => (0xBD40_0000, 0xBC40_0000, 2),
        Arrangement::D => (0xFD40_0000, 0xFC40_0000, 3),
        Arrangement::Q => (0x3DC0_0000, 0x3CC0_0000, 4),
        _ => unreachable!("vector arrangements have no direct load/store form"),
    };
    if load {
        (ldr_scaled, ldr_unscaled, size)
    } else {
        // Stores clear bit 22 of both forms.
        (ldr_scaled & !(1 << 22), ldr_unscaled & !(1 << 22), size)
    }
}

fn fp_mem(arr: Arrangement, load: bool, rt: VReg, rn: Reg, offset: i64) -> Option<u32> {
    let (scaled, unscaled, size) = fp_mem_bases(arr, load);
    let width = 1i64 << size;
    let rt_rn = (rn.index() << 5) | rt.index();
    if offset >= 0 && offset % width == 0 && offset / width <= 4095 {
        return Some(scaled | (((offset / width) as u32) << 10) | rt_rn);
    }
    if (-256..=255).contains(&offset) {
        return Some(unscaled | (((offset as u32) & 0x1FF) << 12) | rt_rn);
    }
    None
}

/// SIMD/FP load with B/H/S/D/Q sizing.
pub fn emit_ldr_fp(arr: Arrangement, rt: VReg, rn: Reg, offset: i64) -> Option<u32> {
    fp_mem(arr, true, rt, rn, offset)
}

pub fn emit_str_fp(arr: Arrangement, rt: VReg, rn: Reg, offset: i64) -> Option<u32> {
    fp_mem(arr, false, rt, rn, offset)
}

fn fp_pair(base: u32, size: u32, rt: VReg, rt2: VReg, rn: Reg, offset: i64) -> Option<u32> {
    let width = 1i64 << size;
    if offset % width != 0 {
        return None;
    }
    let scaled = offset / width;
    if !(-64..=63).contains(&scaled) {
        return None;
    }
    Some(
        base | (((scaled as u32) & 0x7F) << 15)
            | (rt2.index() << 10)
            | (rn.index() << 5)
            | rt.index(),
    )
}

pub fn emit_ldp_fp(arr: Arrangement, rt: VReg, rt2: VReg, rn: Reg, offset: i64) -> Option<u32> {
    match arr {
        Arrangement::S => fp_pair(0x2D40_0000, 2, rt, rt2, rn, offset),
        Arrangement::D => fp_pair(0x6D40_0000, 3, rt, rt2, rn, offset),
        Arrangement::Q => fp_pair(0xAD40_0000, 4, rt, rt2, rn, offset),
        _ => None,
    }
}

pub fn emit_stp_fp(arr: Arrangement, rt: VReg, rt2: VReg, rn: Reg, offset: i64) -> Option<u32> {
    match arr {
        Arrangement::S => fp_pair(0x2D00_0000, 2, rt, rt2, rn, offset),
        Arrangement::D => fp_pair(0x6D00_0000, 3, rt, rt2, rn, offset),
        Arrangement::Q => fp_pair(0xAD00_0000, 4, rt, rt2, rn, offset),
        _ => None,
    }
}

// Single-element structure access: the lane index distributes over
// Q:S:size, narrowing as the element widens.
fn ld1_fields(esize: u32, index: u32) -> Option<(u32, u32, u32, u32)> {
    match esize {
        0 if index < 16 => Some((0b000, index >> 3, (index >> 2) & 1, index & 3)),
        1 if index < 8 => Some((0b010, index >> 2, (index >> 1) & 1, (index & 1) << 1)),
        2 if index < 4 => Some((0b100, index >> 1, index & 1, 0b00)),
        3 if index < 2 => Some((0b100, index, 0, 0b01)),
        _ => None,
    }
}

fn ld1_st1(base: u32, arr: Arrangement, rt: VReg, index: u32, rn: Reg) -> Option<u32> {
    let (opcode, q, s, size) = ld1_fields(arr.size(), index)?;
    Some(
        base | (q << 30)
            | (opcode << 13)
            | (s << 12)
            | (size << 10)
            | (rn.index() << 5)
            | rt.index(),
    )
}

/// Load one element into a lane. The arrangement gives the element
/// width (scalar B/H/S/D shapes).
pub fn emit_ld1_lane(arr: Arrangement, rt: VReg, index: u32, rn: Reg) -> Option<u32> {
    ld1_st1(0x0D40_0000, arr, rt, index, rn)
}

/// Store one lane.
pub fn emit_st1_lane(arr: Arrangement, rt: VReg, index: u32, rn: Reg) -> Option<u32> {
    ld1_st1(0x0D00_0000, arr, rt, index, rn)
}

// ---------------------------------------------------------------------------
// Crypto (AES); 16-byte arrangement only
// ---------------------------------------------------------------------------

pub fn emit_aese(rd: VReg, rn: VReg) -> u32 {
    0x4E28_4800 | vd_vn(rd, rn)
}

pub fn emit_aesd(rd: VReg, rn: VReg) -> u32 {
    0x4E28_5800 | vd_vn(rd, rn)
}

pub fn emit_aesmc(rd: VReg, rn: VReg) -> u32 {
    0x4E28_6800 | vd_vn(rd, rn)
}

pub fn emit_aesimc(rd: VReg, rn: VReg) -> u32 {
    0x4E28_7800 | vd_vn(rd, rn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use Arrangement as A;
    use VReg::*;

    #[test]
    fn test_integer_three_same() {
        assert_eq!(emit_vadd(A::B16, V0, V1, V2), 0x4E228420);
        assert_eq!(emit_vadd(A::D2, V0, V1, V2), 0x4EE28420);
        assert_eq!(emit_vsub(A::H8, V3, V4, V5), 0x6E658483);
        assert_eq!(emit_vand(A::B16, V0, V1, V2), 0x4E221C20);
        assert_eq!(emit_veor(A::B8, V0, V1, V2), 0x2E221C20);
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(emit_cmeq(A::S4, V0, V1, V2), 0x6EA28C20);
        assert_eq!(emit_cmgt_zero(A::S4, V0, V1), 0x4EA08820);
    }

    #[test]
    fn test_reductions() {
        assert_eq!(emit_addv(A::B16, V0, V1), 0x4E31B820);
        assert_eq!(emit_uminv(A::H8, V0, V1), 0x6E71A820);
        assert_eq!(emit_addp(A::S4, V0, V1, V2), 0x4EA2BC20);
    }

    #[test]
    fn test_permutes() {
        assert_eq!(emit_zip1(A::B16, V0, V1, V2), 0x4E023820);
        assert_eq!(emit_trn2(A::S2, V0, V1, V2), 0x0E826820);
    }

    #[test]
    fn test_long_and_narrow() {
        assert_eq!(emit_smull_vec(A::B8, V0, V1, V2), 0x0E22C020);
        assert_eq!(emit_saddl(A::B8, V0, V1, V2), 0x0E220020);
        assert_eq!(emit_xtn(A::S2, V0, V1), 0x0EA12820);
        // 128-bit source selects the second-half variant.
        assert_eq!(emit_xtn(A::S4, V0, V1), 0x4EA12820);
    }

    #[test]
    fn test_shift_immediates() {
        assert_eq!(emit_shl_imm(A::S4, V0, V1, 1), Some(0x4F215420));
        assert_eq!(emit_ushr_imm(A::D2, V0, V1, 1), Some(0x6F7F0420));
        assert_eq!(emit_sxtl(A::B8, V0, V1), 0x0F08A420);
        // Shifting by the element width is representable only for
        // right shifts.
        assert_eq!(emit_shl_imm(A::S4, V0, V1, 32), None);
        assert_eq!(emit_ushr_imm(A::S4, V0, V1, 32), Some(0x6F200420));
        assert_eq!(emit_ushr_imm(A::S4, V0, V1, 33), None);
    }

    #[test]
    fn test_lane_moves() {
        assert_eq!(emit_dup_element(A::B16, V0, V1, 0), Some(0x4E010420));
        assert_eq!(emit_umov(A::S2, Reg::X0, V1, 1), Some(0x0E0C3C20));
        // Index bounds follow the 128-bit lane count.
        assert!(emit_dup_element(A::B16, V0, V1, 15).is_some());
        assert_eq!(emit_dup_element(A::B16, V0, V1, 16), None);
        assert_eq!(emit_umov(A::D2, Reg::X0, V1, 2), None);
    }

    #[test]
    fn test_movi() {
        assert_eq!(emit_movi(A::S4, V0, 1), Some(0x4F000420));
        // 64-bit lanes take the byte-mask form: imm8 selects the
        // all-ones bytes.
        assert_eq!(
            emit_movi(A::D2, V0, 0x0000_FF00_0000_00FF),
            Some(0x6F01E420)
        );
        assert_eq!(emit_movi(A::S4, V0, 0x01020304), None);
    }

    #[test]
    fn test_neon_immediate_shapes() {
        // MSL form for a byte over trailing ones.
        let imm = compute_neon_immediate(0x0000_12FF, A::S4).unwrap();
        assert_eq!((imm.op, imm.cmode, imm.imm8), (0, 0b1100, 0x12));
        // Inverted halfword goes to the MVNI encoding.
        let imm = compute_neon_immediate(0xFF00, A::H8).unwrap();
        assert_eq!((imm.op, imm.cmode, imm.imm8), (0, 0b1010, 0xFF));
        let imm = compute_neon_immediate(0xFEFF, A::H8).unwrap();
        assert_eq!((imm.op, imm.cmode, imm.imm8), (1, 0b1010, 0x01));
    }

    #[test]
    fn test_fp_binary() {
        assert_eq!(emit_fadd(A::S, V0, V1, V2), 0x1E222820);
        assert_eq!(emit_fadd(A::D, V0, V1, V2), 0x1E622820);
        assert_eq!(emit_fadd(A::S4, V0, V1, V2), 0x4E22D420);
        assert_eq!(emit_fmul(A::S4, V0, V1, V2), 0x6E22DC20);
        assert_eq!(emit_fdiv(A::S, V0, V1, V2), 0x1E221820);
    }

    #[test]
    fn test_fp_fma() {
        assert_eq!(emit_fmadd(A::D, V0, V1, V2, V3), 0x1F420C20);
        assert_eq!(emit_fmla(A::S4, V0, V1, V2), 0x4E22CC20);
    }

    #[test]
    fn test_fp_unary() {
        assert_eq!(emit_fabs(A::D, V0, V1), 0x1E60C020);
        assert_eq!(emit_fneg(A::S4, V0, V1), 0x6EA0F820);
        assert_eq!(emit_fsqrt(A::S, V0, V1), 0x1E21C020);
        assert_eq!(emit_fmov_reg(A::D, V0, V1), 0x1E604020);
    }

    #[test]
    fn test_fp_compare() {
        assert_eq!(emit_fcmp(A::D, V0, V1), 0x1E612000);
        assert_eq!(emit_fcmp_zero(A::S, V3), 0x1E202068);
        assert_eq!(emit_fcmeq(A::S4, V0, V1, V2), 0x4E22E420);
    }

    #[test]
    fn test_fp_convert() {
        assert_eq!(emit_fcvt_single_to_double(V0, V1), 0x1E22C020);
        assert_eq!(emit_fcvt_double_to_single(V0, V1), 0x1E624020);
        assert_eq!(
            emit_fcvt_to_int(FpRound::Zero, true, Reg::X0, true, A::D, V1),
            0x9E780020
        );
        assert_eq!(
            emit_fcvt_to_int(FpRound::TiesAway, false, Reg::X2, false, A::S, V3),
            0x1E250062
        );
        assert_eq!(emit_scvtf_general(A::D, V0, Reg::X1, true), 0x9E620020);
        assert_eq!(emit_ucvtf_general(A::S, V0, Reg::X1, false), 0x1E230020);
        assert_eq!(
            emit_fcvt_to_int_vector(FpRound::Zero, true, A::S4, V0, V1),
            0x4EA1B820
        );
        assert_eq!(emit_scvtf_vector(A::S2, V0, V1), 0x0E21D820);
    }

    #[test]
    fn test_fp_memory() {
        assert_eq!(emit_ldr_fp(A::Q, V0, Reg::X1, 0), Some(0x3DC00020));
        assert_eq!(emit_ldr_fp(A::D, V0, Reg::X1, 8), Some(0xFD400420));
        assert_eq!(emit_str_fp(A::S, V2, Reg::SP, 4), Some(0xBD0007E2));
        // Unscaled fallback for a negative offset.
        assert_eq!(
            emit_ldr_fp(A::D, V0, Reg::X1, -8),
            Some(0xFC40_0000 | (0x1F8 << 12) | (1 << 5))
        );
        assert_eq!(emit_ldp_fp(A::D, V0, V1, Reg::SP, 16), Some(0x6D4107E0));
        assert_eq!(emit_stp_fp(A::Q, V0, V1, Reg::SP, 32), Some(0xAD0107E0));
    }

    #[test]
    fn test_ld1_lane() {
        // ld1 {v0.s}[1], [x1]
        assert_eq!(emit_ld1_lane(A::S, V0, 1, Reg::X1), Some(0x0D409020));
        // ld1 {v0.d}[1], [x1]
        assert_eq!(emit_ld1_lane(A::D, V0, 1, Reg::X1), Some(0x4D408420));
        assert_eq!(emit_ld1_lane(A::S, V0, 4, Reg::X1), None);
    }

    #[test]
    fn test_crypto() {
        assert_eq!(emit_aese(V0, V1), 0x4E284820);
        assert_eq!(emit_aesd(V0, V1), 0x4E285820);
        assert_eq!(emit_aesmc(V0, V1), 0x4E286820);
        assert_eq!(emit_aesimc(V0, V1), 0x4E287820);
    }
}
