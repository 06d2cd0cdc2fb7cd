// Code generation helper functions

use smol_str::SmolStr;

use super::error::{CodegenError, CodegenResult};
use super::Codegen;
use crate::lua_value::{LuaValue, UpvalueDesc};
use crate::opcode::{Instruction, OpCode};

/// Emit an instruction into the current prototype and return its position
pub(crate) fn emit(c: &mut Codegen, instr: u32) -> usize {
    let fs = c.fs_mut();
    fs.code.push(instr);
    fs.code.len() - 1
}

/// Emit a JMP placeholder and return its position for later patching
pub(crate) fn emit_jump(c: &mut Codegen) -> usize {
    emit(c, Instruction::create_asbx(OpCode::Jmp, 0, 0))
}

/// Patch the JMP at `pos` to land on the next instruction to be emitted.
/// Jump offsets are relative to the instruction after the JMP.
pub(crate) fn patch_jump(c: &mut Codegen, pos: usize) {
    let target = c.fs().code.len();
    let offset = target as i32 - pos as i32 - 1;
    c.fs_mut().code[pos] = Instruction::create_asbx(OpCode::Jmp, 0, offset);
}

/// Intern a constant in the current prototype
pub(crate) fn add_constant(c: &mut Codegen, value: LuaValue) -> u32 {
    c.fs_mut().intern(value)
}

/// RK operand for a literal value: the constant-pool index with the K bit
/// when it fits the 8-bit RK range, else a register loaded with LOADK
pub(crate) fn rk_value(c: &mut Codegen, value: LuaValue) -> u32 {
    let idx = add_constant(c, value);
    if idx <= Instruction::MAX_INDEX_RK {
        Instruction::rk_as_k(idx)
    } else {
        let reg = c.fs_mut().usable_reg();
        emit(c, Instruction::create_abx(OpCode::LoadK, reg, idx));
        reg
    }
}

/// Register of a declared local. The walker only asks for names it has
/// itself declared, so a miss is fatal.
pub(crate) fn local_reg(c: &Codegen, name: &SmolStr) -> CodegenResult<u32> {
    c.fs()
        .local_reg(name)
        .ok_or_else(|| CodegenError::UndefinedLocal(name.clone()))
}

/// Resolve `name` as an upvalue of the current prototype.
///
/// Walks the parent chain for a declaring local or an existing capture.
/// On a hit, the prototype directly below the provider captures it
/// (`in_stack` from a local register, never for `_ENV`), and one
/// descriptor is threaded through every intermediate prototype down to
/// the requester so the chain stays unbroken. Returns None when no
/// ancestor provides the name; the caller treats it as a global.
pub(crate) fn resolve_upvalue(c: &mut Codegen, name: &str) -> Option<u32> {
    if let Some(idx) = c.protos[c.cur].find_upvalue(name) {
        return Some(idx);
    }

    let mut path = vec![c.cur];
    let mut parent = c.protos[c.cur].parent;
    while let Some(p) = parent {
        let seed = if let Some(reg) = c.protos[p].local_reg(name) {
            Some((name != "_ENV", reg))
        } else {
            c.protos[p].find_upvalue(name).map(|idx| (false, idx))
        };

        if let Some((mut in_stack, mut idx)) = seed {
            for &fp in path.iter().rev() {
                idx = c.protos[fp].add_upvalue(UpvalueDesc {
                    name: SmolStr::new(name),
                    in_stack,
                    idx,
                });
                // lower levels reference their parent's upvalue
                in_stack = false;
            }
            return Some(idx);
        }

        path.push(p);
        parent = c.protos[p].parent;
    }
    None
}

/// Index of `_ENV` in the current prototype, resolving it lazily for
/// nested prototypes. The root bootstrap guarantees resolution succeeds.
pub(crate) fn env_upvalue(c: &mut Codegen) -> u32 {
    resolve_upvalue(c, "_ENV").unwrap_or(0)
}
