//! SysV x86-64 encoder.
//!
//! Implements the [`Emitter`] surface directly as byte sequences: REX.W
//! prefixed 64-bit operations, RBP- and RSP-relative addressing, a label
//! table with 4-byte little-endian rel32 fixups, and a prologue/epilogue
//! pair that saves RBX and R12–R15 and reserves a 16-byte-aligned frame.
//!
//! Calls to runtime helpers resolve through the static helper table into
//! `mov rax, imm64; call rax`; every other call is a relative `call` that
//! is back-patched when its label is defined.

use rustc_hash::FxHashMap;
use strand_runtime::abi;

use crate::emitter::{Cond, Emitter, Reg};
use crate::error::CompileError;

/// Default frame size when none was configured.
const DEFAULT_FRAME: i64 = 56;

pub struct X86Emitter {
    code: Vec<u8>,
    label_offsets: FxHashMap<String, usize>,
    /// (label, offset of the 4 displacement bytes)
    unresolved: Vec<(String, usize)>,
    function_stack_size: i64,
}

impl X86Emitter {
    pub fn new() -> Self {
        Self {
            code: Vec::new(),
            label_offsets: FxHashMap::default(),
            unresolved: Vec::new(),
            function_stack_size: 0,
        }
    }

    /// Remaining (label, site) fixups; empty after a successful finalize.
    pub fn unresolved_references(&self) -> &[(String, usize)] {
        &self.unresolved
    }

    fn frame_size(&self) -> i64 {
        let size = if self.function_stack_size > 0 {
            self.function_stack_size
        } else {
            DEFAULT_FRAME
        };
        (size + 15) & !15
    }

    #[inline]
    fn byte(&mut self, b: u8) {
        self.code.push(b);
    }

    /// REX.W prefix; `r` extends the ModRM reg field, `b` the rm/base.
    #[inline]
    fn rex_w(&mut self, r: bool, b: bool) {
        self.byte(0x48 | (r as u8) << 2 | b as u8);
    }

    #[inline]
    fn modrm(&mut self, mode: u8, reg: u8, rm: u8) {
        self.byte(mode << 6 | (reg & 7) << 3 | (rm & 7));
    }

    fn imm32(&mut self, value: i32) {
        self.code.extend_from_slice(&value.to_le_bytes());
    }

    fn imm64(&mut self, value: i64) {
        self.code.extend_from_slice(&value.to_le_bytes());
    }

    /// `[rbp + disp]` operand with `reg` in the ModRM reg field.
    fn rbp_disp(&mut self, opcode: u8, reg: Reg, offset: i64) {
        self.rex_w(reg.index() >= 8, false);
        self.byte(opcode);
        if (-128..=127).contains(&offset) {
            self.modrm(0b01, reg.index(), 5);
            self.byte(offset as i8 as u8);
        } else {
            self.modrm(0b10, reg.index(), 5);
            self.imm32(offset as i32);
        }
    }

    /// `[rsp + disp]` operand (SIB form) with `reg` in the reg field.
    fn rsp_disp(&mut self, opcode: u8, reg: Reg, offset: i64) {
        self.rex_w(reg.index() >= 8, false);
        self.byte(opcode);
        if (-128..=127).contains(&offset) {
            self.modrm(0b01, reg.index(), 4);
            self.byte(0x24);
            self.byte(offset as i8 as u8);
        } else {
            self.modrm(0b10, reg.index(), 4);
            self.byte(0x24);
            self.imm32(offset as i32);
        }
    }

    /// Emit a rel32 displacement to `label`: resolved immediately when the
    /// label is known, otherwise recorded for back-patching.
    fn rel32(&mut self, label: &str) {
        if let Some(&target) = self.label_offsets.get(label) {
            let site = self.code.len();
            let rel = target as i64 - (site as i64 + 4);
            self.imm32(rel as i32);
        } else {
            self.unresolved.push((label.to_string(), self.code.len()));
            self.code.extend_from_slice(&[0; 4]);
        }
    }

    fn restore_frame(&mut self) {
        let size = self.frame_size();
        self.add_reg_imm(Reg::Rsp, size);
        // pop r15, r14, r13, r12
        self.code.extend_from_slice(&[0x41, 0x5F, 0x41, 0x5E, 0x41, 0x5D, 0x41, 0x5C]);
        self.byte(0x5B); // pop rbx
        self.byte(0x5D); // pop rbp
        self.byte(0xC3); // ret
    }
}

impl Default for X86Emitter {
    fn default() -> Self {
        Self::new()
    }
}

impl Emitter for X86Emitter {
    fn prologue(&mut self) {
        self.byte(0x55); // push rbp
        self.mov_reg_reg(Reg::Rbp, Reg::Rsp);
        // Save callee-saved registers
        self.byte(0x53); // push rbx
        self.code.extend_from_slice(&[0x41, 0x54, 0x41, 0x55, 0x41, 0x56, 0x41, 0x57]);
        let size = self.frame_size();
        self.sub_reg_imm(Reg::Rsp, size);
    }

    fn epilogue(&mut self) {
        self.restore_frame();
    }

    fn function_return(&mut self) {
        self.restore_frame();
    }

    fn mov_reg_imm(&mut self, reg: Reg, value: i64) {
        if i32::try_from(value).is_ok() {
            self.rex_w(false, reg.index() >= 8);
            self.byte(0xC7);
            self.modrm(0b11, 0, reg.index());
            self.imm32(value as i32);
        } else {
            self.rex_w(false, reg.index() >= 8);
            self.byte(0xB8 | (reg.index() & 7));
            self.imm64(value);
        }
    }

    fn mov_reg_reg(&mut self, dst: Reg, src: Reg) {
        self.rex_w(src.index() >= 8, dst.index() >= 8);
        self.byte(0x89);
        self.modrm(0b11, src.index(), dst.index());
    }

    fn store_local(&mut self, offset: i64, src: Reg) {
        self.rbp_disp(0x89, src, offset);
    }

    fn load_local(&mut self, dst: Reg, offset: i64) {
        self.rbp_disp(0x8B, dst, offset);
    }

    fn store_rsp(&mut self, offset: i64, src: Reg) {
        self.rsp_disp(0x89, src, offset);
    }

    fn load_rsp(&mut self, dst: Reg, offset: i64) {
        self.rsp_disp(0x8B, dst, offset);
    }

    fn add_reg_imm(&mut self, reg: Reg, value: i64) {
        self.rex_w(false, reg.index() >= 8);
        if (-128..=127).contains(&value) {
            self.byte(0x83);
            self.modrm(0b11, 0, reg.index());
            self.byte(value as i8 as u8);
        } else {
            self.byte(0x81);
            self.modrm(0b11, 0, reg.index());
            self.imm32(value as i32);
        }
    }

    fn add_reg_reg(&mut self, dst: Reg, src: Reg) {
        self.rex_w(src.index() >= 8, dst.index() >= 8);
        self.byte(0x01);
        self.modrm(0b11, src.index(), dst.index());
    }

    fn sub_reg_imm(&mut self, reg: Reg, value: i64) {
        self.rex_w(false, reg.index() >= 8);
        if (-128..=127).contains(&value) {
            self.byte(0x83);
            self.modrm(0b11, 5, reg.index());
            self.byte(value as i8 as u8);
        } else {
            self.byte(0x81);
            self.modrm(0b11, 5, reg.index());
            self.imm32(value as i32);
        }
    }

    fn sub_reg_reg(&mut self, dst: Reg, src: Reg) {
        self.rex_w(src.index() >= 8, dst.index() >= 8);
        self.byte(0x29);
        self.modrm(0b11, src.index(), dst.index());
    }

    fn mul_reg_reg(&mut self, dst: Reg, src: Reg) {
        self.rex_w(dst.index() >= 8, src.index() >= 8);
        self.byte(0x0F);
        self.byte(0xAF);
        self.modrm(0b11, dst.index(), src.index());
    }

    fn div_reg_reg(&mut self, dst: Reg, src: Reg) {
        self.mov_reg_reg(Reg::Rax, dst);
        self.byte(0x48); // cqo: sign-extend rax into rdx:rax
        self.byte(0x99);
        self.rex_w(false, src.index() >= 8);
        self.byte(0xF7);
        self.modrm(0b11, 7, src.index()); // idiv
        self.mov_reg_reg(dst, Reg::Rax);
    }

    fn mod_reg_reg(&mut self, dst: Reg, src: Reg) {
        self.mov_reg_reg(Reg::Rax, dst);
        self.byte(0x48);
        self.byte(0x99);
        self.rex_w(false, src.index() >= 8);
        self.byte(0xF7);
        self.modrm(0b11, 7, src.index());
        self.mov_reg_reg(dst, Reg::Rdx);
    }

    fn and_reg_imm(&mut self, reg: Reg, value: i64) {
        self.rex_w(false, reg.index() >= 8);
        if (-128..=127).contains(&value) {
            self.byte(0x83);
            self.modrm(0b11, 4, reg.index());
            self.byte(value as i8 as u8);
        } else {
            self.byte(0x81);
            self.modrm(0b11, 4, reg.index());
            self.imm32(value as i32);
        }
    }

    fn xor_reg_reg(&mut self, dst: Reg, src: Reg) {
        self.rex_w(src.index() >= 8, dst.index() >= 8);
        self.byte(0x31);
        self.modrm(0b11, src.index(), dst.index());
    }

    fn cmp_reg_reg(&mut self, a: Reg, b: Reg) {
        self.rex_w(b.index() >= 8, a.index() >= 8);
        self.byte(0x39);
        self.modrm(0b11, b.index(), a.index());
    }

    fn set_cc(&mut self, cond: Cond, reg: Reg) {
        // SPL/BPL/SIL/DIL need a REX prefix to address their low byte.
        if reg.index() >= 8 {
            self.byte(0x41);
        } else if reg.index() >= 4 {
            self.byte(0x40);
        }
        self.byte(0x0F);
        self.byte(match cond {
            Cond::Less => 0x9C,
            Cond::Greater => 0x9F,
            Cond::Equal => 0x94,
            Cond::NotEqual => 0x95,
            Cond::LessEqual => 0x9E,
            Cond::GreaterEqual => 0x9D,
        });
        self.modrm(0b11, 0, reg.index());
    }

    fn jump(&mut self, label: &str) {
        self.byte(0xE9);
        self.rel32(label);
    }

    fn jump_if_zero(&mut self, label: &str) {
        self.byte(0x0F);
        self.byte(0x84);
        self.rel32(label);
    }

    fn jump_if_not_zero(&mut self, label: &str) {
        self.byte(0x0F);
        self.byte(0x85);
        self.rel32(label);
    }

    fn call(&mut self, label: &str) {
        if let Some(addr) = abi::helper_address(label) {
            // mov rax, imm64 ; call rax
            self.byte(0x48);
            self.byte(0xB8);
            self.imm64(addr as i64);
            self.byte(0xFF);
            self.byte(0xD0);
            return;
        }
        self.byte(0xE8);
        self.rel32(label);
    }

    fn call_reg(&mut self, reg: Reg) {
        if reg.index() >= 8 {
            self.byte(0x41);
        }
        self.byte(0xFF);
        self.modrm(0b11, 2, reg.index());
    }

    fn label(&mut self, name: &str) {
        let offset = self.code.len();
        self.label_offsets.insert(name.to_string(), offset);

        let mut remaining = Vec::new();
        for (label, site) in self.unresolved.drain(..) {
            if label == name {
                let rel = offset as i64 - (site as i64 + 4);
                let bytes = (rel as i32).to_le_bytes();
                self.code[site..site + 4].copy_from_slice(&bytes);
            } else {
                remaining.push((label, site));
            }
        }
        self.unresolved = remaining;
    }

    fn set_function_stack_size(&mut self, size: i64) {
        self.function_stack_size = size;
    }

    fn current_offset(&self) -> usize {
        self.code.len()
    }

    fn code(&self) -> &[u8] {
        &self.code
    }

    fn label_offsets(&self) -> &FxHashMap<String, usize> {
        &self.label_offsets
    }

    fn finalize(&mut self) -> Result<(), CompileError> {
        if let Some((label, _)) = self.unresolved.first() {
            return Err(CompileError::Link(label.clone()));
        }
        let size = self.code.len();
        for (label, &offset) in &self.label_offsets {
            if offset >= size {
                return Err(CompileError::Link(label.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emit<F: FnOnce(&mut X86Emitter)>(f: F) -> Vec<u8> {
        let mut e = X86Emitter::new();
        f(&mut e);
        e.code().to_vec()
    }

    #[test]
    fn test_mov_reg_imm_small() {
        assert_eq!(
            emit(|e| e.mov_reg_imm(Reg::Rax, 42)),
            vec![0x48, 0xC7, 0xC0, 42, 0, 0, 0]
        );
        assert_eq!(
            emit(|e| e.mov_reg_imm(Reg::R8, 1)),
            vec![0x49, 0xC7, 0xC0, 1, 0, 0, 0]
        );
    }

    #[test]
    fn test_mov_reg_imm_wide() {
        let code = emit(|e| e.mov_reg_imm(Reg::Rdi, 0x1122_3344_5566_7788));
        assert_eq!(&code[..2], &[0x48, 0xBF]);
        assert_eq!(&code[2..], &0x1122_3344_5566_7788i64.to_le_bytes());
    }

    #[test]
    fn test_mov_reg_reg() {
        assert_eq!(emit(|e| e.mov_reg_reg(Reg::Rbp, Reg::Rsp)), vec![0x48, 0x89, 0xE5]);
        assert_eq!(emit(|e| e.mov_reg_reg(Reg::Rdi, Reg::Rax)), vec![0x48, 0x89, 0xC7]);
        // r8 as source needs REX.R
        assert_eq!(emit(|e| e.mov_reg_reg(Reg::Rax, Reg::R8)), vec![0x4C, 0x89, 0xC0]);
        // r8 as destination needs REX.B
        assert_eq!(emit(|e| e.mov_reg_reg(Reg::R8, Reg::Rax)), vec![0x49, 0x89, 0xC0]);
    }

    #[test]
    fn test_locals_addressing() {
        assert_eq!(emit(|e| e.store_local(-8, Reg::Rax)), vec![0x48, 0x89, 0x45, 0xF8]);
        assert_eq!(emit(|e| e.load_local(Reg::Rax, -8)), vec![0x48, 0x8B, 0x45, 0xF8]);
        // r8 into the reg field needs REX.R
        assert_eq!(emit(|e| e.store_local(-16, Reg::R8)), vec![0x4C, 0x89, 0x45, 0xF0]);
        // 32-bit displacement
        assert_eq!(
            emit(|e| e.load_local(Reg::Rcx, -256)),
            vec![0x48, 0x8B, 0x8D, 0x00, 0xFF, 0xFF, 0xFF]
        );
    }

    #[test]
    fn test_rsp_addressing_uses_sib() {
        assert_eq!(emit(|e| e.store_rsp(0, Reg::Rax)), vec![0x48, 0x89, 0x44, 0x24, 0x00]);
        assert_eq!(emit(|e| e.load_rsp(Reg::Rbx, 8)), vec![0x48, 0x8B, 0x5C, 0x24, 0x08]);
    }

    #[test]
    fn test_arithmetic_encodings() {
        assert_eq!(emit(|e| e.add_reg_reg(Reg::Rax, Reg::Rbx)), vec![0x48, 0x01, 0xD8]);
        assert_eq!(emit(|e| e.sub_reg_reg(Reg::Rbx, Reg::Rax)), vec![0x48, 0x29, 0xC3]);
        assert_eq!(emit(|e| e.sub_reg_imm(Reg::Rsp, 8)), vec![0x48, 0x83, 0xEC, 0x08]);
        assert_eq!(emit(|e| e.add_reg_imm(Reg::Rsp, 8)), vec![0x48, 0x83, 0xC4, 0x08]);
        assert_eq!(
            emit(|e| e.mul_reg_reg(Reg::Rbx, Reg::Rax)),
            vec![0x48, 0x0F, 0xAF, 0xD8]
        );
        assert_eq!(emit(|e| e.xor_reg_reg(Reg::Rax, Reg::Rcx)), vec![0x48, 0x31, 0xC8]);
    }

    #[test]
    fn test_division_sequence() {
        // div rcx by rax: mov rax, rcx; cqo; idiv rax... the divisor is
        // the src operand
        let code = emit(|e| e.div_reg_reg(Reg::Rcx, Reg::Rbx));
        // mov rax, rcx ; cqo ; idiv rbx ; mov rcx, rax
        assert_eq!(
            code,
            vec![0x48, 0x89, 0xC8, 0x48, 0x99, 0x48, 0xF7, 0xFB, 0x48, 0x89, 0xC1]
        );
    }

    #[test]
    fn test_compare_and_setcc() {
        assert_eq!(emit(|e| e.cmp_reg_reg(Reg::Rax, Reg::Rcx)), vec![0x48, 0x39, 0xC8]);
        assert_eq!(emit(|e| e.set_cc(Cond::Equal, Reg::Rax)), vec![0x0F, 0x94, 0xC0]);
        assert_eq!(emit(|e| e.set_cc(Cond::Less, Reg::Rax)), vec![0x0F, 0x9C, 0xC0]);
        assert_eq!(emit(|e| e.set_cc(Cond::NotEqual, Reg::Rcx)), vec![0x0F, 0x95, 0xC1]);
        // DIL needs a bare REX prefix
        assert_eq!(
            emit(|e| e.set_cc(Cond::Greater, Reg::Rdi)),
            vec![0x40, 0x0F, 0x9F, 0xC7]
        );
    }

    #[test]
    fn test_and_mask_uses_imm32_for_0xff() {
        // 0xFF must not be sign-extended from imm8 (that would be -1)
        assert_eq!(
            emit(|e| e.and_reg_imm(Reg::Rax, 0xFF)),
            vec![0x48, 0x81, 0xE0, 0xFF, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_forward_jump_backpatch() {
        let mut e = X86Emitter::new();
        e.jump("target");
        e.mov_reg_imm(Reg::Rax, 0); // 7 bytes
        e.label("target");
        let code = e.code();
        // E9 <rel32>: site at offset 1, next insn at 5, target at 12
        let rel = i32::from_le_bytes([code[1], code[2], code[3], code[4]]);
        assert_eq!(rel, 12 - 5);
        assert!(e.unresolved_references().is_empty());
    }

    #[test]
    fn test_backward_jump_resolved_immediately() {
        let mut e = X86Emitter::new();
        e.label("loop");
        e.mov_reg_imm(Reg::Rax, 0); // 7 bytes
        e.jump("loop"); // E9 at 7, rel site at 8, next at 12
        let code = e.code();
        let rel = i32::from_le_bytes([code[8], code[9], code[10], code[11]]);
        assert_eq!(rel, 0 - 12);
    }

    #[test]
    fn test_conditional_jump_displacement_invariant() {
        let mut e = X86Emitter::new();
        e.jump_if_zero("end");
        e.mov_reg_imm(Reg::Rcx, 1);
        e.label("end");
        let code = e.code();
        // 0F 84 <rel32>: site at 2
        let rel = i32::from_le_bytes([code[2], code[3], code[4], code[5]]);
        let label_offset = *e.label_offsets().get("end").unwrap() as i32;
        assert_eq!(rel, label_offset - (2 + 4));
    }

    #[test]
    fn test_helper_call_is_absolute() {
        let code = emit(|e| e.call("__runtime_pow"));
        assert_eq!(&code[..2], &[0x48, 0xB8]);
        assert_eq!(&code[10..], &[0xFF, 0xD0]);
        let addr = u64::from_le_bytes(code[2..10].try_into().unwrap());
        assert_eq!(
            addr as usize,
            strand_runtime::abi::helper_address("__runtime_pow").unwrap()
        );
    }

    #[test]
    fn test_unknown_label_call_is_relative_with_fixup() {
        let mut e = X86Emitter::new();
        e.call("some_function");
        assert_eq!(e.code()[0], 0xE8);
        assert_eq!(e.unresolved_references().len(), 1);
        assert!(e.finalize().is_err());

        e.label("some_function");
        e.mov_reg_imm(Reg::Rax, 0);
        assert!(e.finalize().is_ok());
    }

    #[test]
    fn test_call_reg() {
        assert_eq!(emit(|e| e.call_reg(Reg::Rax)), vec![0xFF, 0xD0]);
        assert_eq!(emit(|e| e.call_reg(Reg::R10)), vec![0x41, 0xFF, 0xD2]);
    }

    #[test]
    fn test_prologue_epilogue_symmetry() {
        let mut e = X86Emitter::new();
        e.set_function_stack_size(100); // rounds up to 112
        e.prologue();
        let prologue_len = e.current_offset();
        e.epilogue();
        let code = e.code().to_vec();

        // Prologue tail: sub rsp, 112 (imm8 fits)
        assert_eq!(&code[prologue_len - 4..prologue_len], &[0x48, 0x83, 0xEC, 112]);
        // Epilogue head: add rsp, 112
        assert_eq!(
            &code[prologue_len..prologue_len + 4],
            &[0x48, 0x83, 0xC4, 112]
        );
        // Epilogue restores r15..r12, rbx, rbp then returns
        assert_eq!(
            &code[prologue_len + 4..],
            &[0x41, 0x5F, 0x41, 0x5E, 0x41, 0x5D, 0x41, 0x5C, 0x5B, 0x5D, 0xC3]
        );
    }

    #[test]
    fn test_frame_is_16_byte_multiple() {
        for requested in [0i64, 1, 56, 80, 81, 100, 1000] {
            let mut e = X86Emitter::new();
            e.set_function_stack_size(requested);
            e.prologue();
            let code = e.code();
            // The sub rsp immediate is the last bytes of the prologue
            let imm = if code.len() >= 7 && code[code.len() - 7] == 0x48 && code[code.len() - 6] == 0x81 {
                i32::from_le_bytes(code[code.len() - 4..].try_into().unwrap()) as i64
            } else {
                code[code.len() - 1] as i64
            };
            assert_eq!(imm % 16, 0, "frame {} not aligned", imm);
            assert!(imm >= requested.min(56));
        }
    }

    #[test]
    fn test_finalize_rejects_label_at_end() {
        let mut e = X86Emitter::new();
        e.mov_reg_imm(Reg::Rax, 0);
        e.label("dangling");
        assert!(e.finalize().is_err());
    }

    #[test]
    fn test_label_offsets_within_code() {
        let mut e = X86Emitter::new();
        e.label("start");
        e.prologue();
        e.label("mid");
        e.epilogue();
        assert!(e.finalize().is_ok());
        for (_, &off) in e.label_offsets() {
            assert!(off < e.code().len());
        }
    }
}
