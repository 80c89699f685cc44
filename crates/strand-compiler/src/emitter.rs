//! The encoding-agnostic instruction surface.
//!
//! Code generators emit through this trait; the x86-64 encoder implements
//! it. Registers are named abstractly but follow the SysV integer order so
//! generators can reason about the calling convention.

use rustc_hash::FxHashMap;

use crate::error::CompileError;

/// General-purpose registers, numbered per the x86-64 encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Reg {
    Rax = 0,
    Rcx = 1,
    Rdx = 2,
    Rbx = 3,
    Rsp = 4,
    Rbp = 5,
    Rsi = 6,
    Rdi = 7,
    R8 = 8,
    R9 = 9,
    R10 = 10,
    R11 = 11,
    R12 = 12,
    R13 = 13,
    R14 = 14,
    R15 = 15,
}

impl Reg {
    #[inline]
    pub fn index(self) -> u8 {
        self as u8
    }

    /// Integer argument registers in SysV order.
    pub const ARGS: [Reg; 6] = [Reg::Rdi, Reg::Rsi, Reg::Rdx, Reg::Rcx, Reg::R8, Reg::R9];
}

/// Condition for set-byte-on-condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
    Less,
    Greater,
    Equal,
    NotEqual,
    LessEqual,
    GreaterEqual,
}

/// Instruction-set-independent emitter surface.
///
/// Labels are plain strings; unresolved control transfers are recorded and
/// back-patched when the label is defined. `finalize` fails if any
/// reference is still unresolved when the code is sealed.
pub trait Emitter {
    /// Function prologue with the configured frame size.
    fn prologue(&mut self);

    /// Standard epilogue: restore the exact prologue allocation and return.
    fn epilogue(&mut self);

    /// Early-return epilogue (identical restore path, usable mid-body).
    fn function_return(&mut self);

    fn mov_reg_imm(&mut self, reg: Reg, value: i64);
    fn mov_reg_reg(&mut self, dst: Reg, src: Reg);

    /// `[rbp + offset] = src`
    fn store_local(&mut self, offset: i64, src: Reg);
    /// `dst = [rbp + offset]`
    fn load_local(&mut self, dst: Reg, offset: i64);
    /// `[rsp + offset] = src`
    fn store_rsp(&mut self, offset: i64, src: Reg);
    /// `dst = [rsp + offset]`
    fn load_rsp(&mut self, dst: Reg, offset: i64);

    fn add_reg_imm(&mut self, reg: Reg, value: i64);
    fn add_reg_reg(&mut self, dst: Reg, src: Reg);
    fn sub_reg_imm(&mut self, reg: Reg, value: i64);
    fn sub_reg_reg(&mut self, dst: Reg, src: Reg);
    fn mul_reg_reg(&mut self, dst: Reg, src: Reg);
    /// Signed division; quotient lands in `dst`.
    fn div_reg_reg(&mut self, dst: Reg, src: Reg);
    /// Signed remainder; remainder lands in `dst`.
    fn mod_reg_reg(&mut self, dst: Reg, src: Reg);
    fn and_reg_imm(&mut self, reg: Reg, value: i64);
    fn xor_reg_reg(&mut self, dst: Reg, src: Reg);

    /// Compare `a` with `b` (sets flags for `a - b`).
    fn cmp_reg_reg(&mut self, a: Reg, b: Reg);
    /// Set the low byte of `reg` on condition; upper bits are unchanged.
    fn set_cc(&mut self, cond: Cond, reg: Reg);

    fn jump(&mut self, label: &str);
    fn jump_if_zero(&mut self, label: &str);
    fn jump_if_not_zero(&mut self, label: &str);

    /// Call a label. Runtime-helper names resolve through the static
    /// helper table into an absolute-address call; all other names use a
    /// relative call with back-patching.
    fn call(&mut self, label: &str);
    /// Indirect call through a register.
    fn call_reg(&mut self, reg: Reg);

    /// Define a label at the current offset, patching pending references.
    fn label(&mut self, name: &str);

    /// Per-function frame size used by the next prologue/epilogue pair.
    fn set_function_stack_size(&mut self, size: i64);

    fn current_offset(&self) -> usize;
    fn code(&self) -> &[u8];
    fn label_offsets(&self) -> &FxHashMap<String, usize>;

    /// Seal the code: every recorded reference must be resolved and every
    /// label offset must lie within the emitted code.
    fn finalize(&mut self) -> Result<(), CompileError>;
}
