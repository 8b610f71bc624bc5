//! Encoder verification: the full case table, determinism, and the
//! boundary behavior of every immediate form.

use fasterbasic::encoder::*;
use fasterbasic::verify;

#[test]
fn test_verification_table_static() {
    let cases = verify::build_cases();
    let mismatches = verify::check_static(&cases);
    assert!(
        mismatches.is_empty(),
        "{} mismatching encodings, first: {:?}",
        mismatches.len(),
        mismatches.first()
    );
}

#[test]
fn test_encoder_is_deterministic() {
    // Repeated calls with identical arguments produce identical words.
    for _ in 0..3 {
        assert_eq!(
            emit_add_register_64(Reg::X0, Reg::X1, reg_only(Reg::X2)),
            0x8B020020
        );
        assert_eq!(emit_load_immediate_64(Reg::X3, 0x1234_5678_9ABC_DEF0),
                   emit_load_immediate_64(Reg::X3, 0x1234_5678_9ABC_DEF0));
    }
}

#[test]
fn test_condition_inversion_involutive() {
    for cond in [
        Cond::Eq,
        Cond::Ne,
        Cond::Hs,
        Cond::Lo,
        Cond::Mi,
        Cond::Pl,
        Cond::Vs,
        Cond::Vc,
        Cond::Hi,
        Cond::Ls,
        Cond::Ge,
        Cond::Lt,
        Cond::Gt,
        Cond::Le,
        Cond::Al,
        Cond::Nv,
    ] {
        assert_eq!(cond.invert().invert(), cond);
    }
}

#[test]
fn test_logical_immediate_round_trip() {
    // Encode/decode reproduces the value for everything that encodes.
    let mut encoded = 0usize;
    for shift in 0..64u32 {
        for width in 1..64u32 {
            let run = if width >= 64 { u64::MAX } else { (1u64 << width) - 1 };
            let value = run.rotate_left(shift);
            if let Some(imm) = encode_logical_immediate_64(value) {
                encoded += 1;
                assert_eq!(
                    bitmask::decode_logical_immediate(imm, 64),
                    value,
                    "value {:#x}",
                    value
                );
            }
        }
    }
    // Every single rotated run is representable.
    assert_eq!(encoded, 64 * 63);
}

#[test]
fn test_logical_immediate_boundaries() {
    assert!(encode_logical_immediate_64(0).is_none());
    assert!(encode_logical_immediate_64(u64::MAX).is_none());
    assert!(encode_logical_immediate_32(0).is_none());
    assert!(encode_logical_immediate_32(u32::MAX).is_none());
    assert!(logical_immediate_64_encodable(0xFF00FF00FF00FF00));
    assert!(!logical_immediate_64_encodable(0x0123_4567_89AB_CDEF));
}

#[test]
fn test_add_imm_boundaries() {
    // 4095 unshifted, 4096 as LSL #12, 4097 unencodable.
    assert!(emit_add_imm_64(Reg::X0, Reg::X1, 4095).is_some());
    let shifted = emit_add_imm_64(Reg::X0, Reg::X1, 4096).unwrap();
    assert_eq!(shifted & (1 << 22), 1 << 22);
    assert!(emit_add_imm_64(Reg::X0, Reg::X1, 4097).is_none());
}

#[test]
fn test_branch_displacement_boundaries() {
    assert!(emit_b((1 << 25) - 1).is_some());
    assert!(emit_b(1 << 25).is_none());
    assert!(emit_b(-(1 << 25)).is_some());
    assert!(emit_b_cond(Cond::Eq, (1 << 18) - 1).is_some());
    assert!(emit_b_cond(Cond::Eq, 1 << 18).is_none());
    assert!(emit_tbz(Reg::X0, 63, (1 << 13) - 1).is_some());
    assert!(emit_tbz(Reg::X0, 63, 1 << 13).is_none());
}

#[test]
fn test_neon_lane_boundaries() {
    // Index lanes-1 encodes; index lanes fails.
    assert!(emit_dup_element(Arrangement::B16, VReg::V0, VReg::V1, 15).is_some());
    assert!(emit_dup_element(Arrangement::B16, VReg::V0, VReg::V1, 16).is_none());
    assert!(emit_ins_general(Arrangement::S4, VReg::V0, 3, Reg::X0).is_some());
    assert!(emit_ins_general(Arrangement::S4, VReg::V0, 4, Reg::X0).is_none());
    assert!(emit_umov(Arrangement::D2, Reg::X0, VReg::V1, 1).is_some());
    assert!(emit_umov(Arrangement::D2, Reg::X0, VReg::V1, 2).is_none());
}

#[test]
fn test_neon_immediate_totality() {
    // compute_neon_immediate returns None exactly when no cmode fits.
    assert!(compute_neon_immediate(0xFF, Arrangement::B16).is_some());
    assert!(compute_neon_immediate(0x1_00, Arrangement::B16).is_none());
    assert!(compute_neon_immediate(0x1200, Arrangement::H8).is_some());
    assert!(compute_neon_immediate(0x1234, Arrangement::H8).is_none());
    assert!(compute_neon_immediate(0xFF00_0000, Arrangement::S4).is_some());
    assert!(compute_neon_immediate(0x0102_0304, Arrangement::S4).is_none());
    assert!(compute_neon_immediate(0xFFFF_FFFF_0000_0000, Arrangement::D2).is_some());
    assert!(compute_neon_immediate(0x0000_0001_0000_0000, Arrangement::D2).is_none());
}

#[test]
fn test_load_immediate_minimality() {
    // Known minimal sequences.
    assert_eq!(emit_load_immediate_64(Reg::X0, 0).len(), 1);
    assert_eq!(emit_load_immediate_64(Reg::X0, 42).len(), 1);
    assert_eq!(emit_load_immediate_64(Reg::X0, u64::MAX).len(), 1);
    assert_eq!(emit_load_immediate_64(Reg::X0, 0xFF).len(), 1); // logical
    assert_eq!(emit_load_immediate_64(Reg::X0, 0x1_0000_0000).len(), 1);
    assert_eq!(emit_load_immediate_64(Reg::X0, 0x1_0000_002A).len(), 2);
    assert_eq!(
        emit_load_immediate_64(Reg::X0, 0x1234_5678_9ABC_DEF0).len(),
        4
    );
    assert_eq!(emit_load_immediate_32(Reg::X0, 7).len(), 1);
}

#[test]
fn test_scenario_words() {
    assert_eq!(emit_nop(), 0xD503201F);
    assert_eq!(
        emit_add_register_64(Reg::X0, Reg::X1, reg_only(Reg::X2)),
        0x8B020020
    );
    assert_eq!(emit_b(1), Some(0x14000001));
    assert_eq!(emit_load_immediate_64(Reg::X0, 0), vec![0xD2800000]);
}

#[test]
fn test_branch_fixup_classes() {
    for (word, class) in [
        (0x14000000u32, BranchClass::Imm26),
        (0x94000000, BranchClass::Imm26),
        (0x54000000, BranchClass::Imm19),
        (0x34000000, BranchClass::Imm19),
        (0xB5000000, BranchClass::Imm19),
        (0x36000000, BranchClass::Imm14),
        (0xD503201F, BranchClass::Invalid),
        (0x8B020020, BranchClass::Invalid),
    ] {
        assert_eq!(BranchClass::of(word), class, "{:#x}", word);
    }
}
