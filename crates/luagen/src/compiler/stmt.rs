// Statement lowering

use smol_str::SmolStr;

use super::error::{CodegenError, CodegenResult};
use super::expr::{
    compile_call_expr, compile_cond_expr, compile_expr_to, compile_function_proto,
};
use super::helpers::*;
use super::{compile_block, Codegen};
use crate::lua_ast::{Block, Expr, Stat};
use crate::lua_value::LuaValue;
use crate::opcode::{Instruction, OpCode};

/// A store whose value had to be computed into a temporary first;
/// flushed after the whole right-hand side has been evaluated
enum PendingStore {
    Upvalue { idx: u32, value: u32 },
    Global { env: u32, key: u32, value: u32 },
}

/// Resolved assignment target
enum Target {
    Local(u32),
    Upvalue(u32),
    Global { env: u32, key: u32 },
}

/// Compile any statement
pub(crate) fn compile_stat(c: &mut Codegen, stat: &Stat) -> CodegenResult<()> {
    match stat {
        Stat::Local { names, exprs } => compile_local_stat(c, names, exprs),
        Stat::Assign { targets, values } => compile_assign_stat(c, targets, values),
        Stat::If {
            cond,
            then_block,
            else_block,
        } => compile_if_stat(c, cond, then_block, else_block.as_ref()),
        Stat::Do(block) => compile_block(c, block),
        Stat::Call(expr) => compile_call_stat(c, expr),
        Stat::Return(exprs) => compile_return_stat(c, exprs),
        Stat::Function {
            name,
            is_local,
            params,
            body,
        } => compile_function_stat(c, name, *is_local, params, body),
        Stat::While { .. } => Err(CodegenError::Unsupported("while statement")),
        Stat::Repeat { .. } => Err(CodegenError::Unsupported("repeat statement")),
        Stat::NumericFor { .. } => Err(CodegenError::Unsupported("numeric for statement")),
        Stat::GenericFor { .. } => Err(CodegenError::Unsupported("generic for statement")),
    }
}

/// Compile `local a, b, ... = e1, e2, ...`
///
/// Every name gets a fresh register up front, so initializers compile
/// straight into their variables. A trailing call expression is asked for
/// one result per remaining name and populates the tail registers itself;
/// names without an initializer load nil.
fn compile_local_stat(c: &mut Codegen, names: &[SmolStr], exprs: &[Expr]) -> CodegenResult<()> {
    for name in names {
        let reg = c.fs_mut().alloc_reg();
        c.fs_mut().def_local(name.clone(), reg);
    }

    let last = exprs.len().checked_sub(1);
    for (i, name) in names.iter().enumerate() {
        let dest = local_reg(c, name)?;
        if i >= exprs.len() {
            emit(c, Instruction::create_abc(OpCode::LoadNil, dest, 0, 0));
            continue;
        }
        match &exprs[i] {
            Expr::Call { callee, args } if Some(i) == last => {
                let want = (names.len() - exprs.len() + 1) as i32;
                compile_call_expr(c, callee, args, dest, want)?;
                // the call delivered the remaining names in the registers
                // following its own
                return Ok(());
            }
            e => compile_expr_to(c, e, dest)?,
        }
    }
    Ok(())
}

/// Compile `l1, ..., lN = r1, ..., rM`
///
/// Targets are resolved before their values (global names are interned at
/// resolution time). Locals receive values in place; upvalue and global
/// targets compute into temporaries and flush as SETUPVAL/SETTABUP in
/// collection order once the whole right-hand side is done. A non-call
/// value list is nil-padded to the target count; a trailing call populates
/// the registers following its own, which the remaining targets consume
/// verbatim.
fn compile_assign_stat(c: &mut Codegen, targets: &[Expr], values: &[Expr]) -> CodegenResult<()> {
    let last = values.len().checked_sub(1);
    let mut pending: Vec<PendingStore> = Vec::new();
    let mut tail_reg = None;

    for (i, target) in targets.iter().enumerate() {
        let Expr::Name(name) = target else {
            return Err(CodegenError::Unsupported("assignment target"));
        };

        // resolve the target before visiting its value
        let target = if let Some(reg) = c.fs().local_reg(name) {
            Target::Local(reg)
        } else if let Some(idx) = resolve_upvalue(c, name) {
            Target::Upvalue(idx)
        } else {
            let env = env_upvalue(c);
            let key = rk_value(c, LuaValue::Str(name.clone()));
            Target::Global { env, key }
        };

        // the register the value of this target ends up in
        let value_reg = if let Some(call_reg) = tail_reg {
            // populated by the trailing call, one register per extra target
            call_reg + (i - values.len() + 1) as u32
        } else {
            let dest = match &target {
                Target::Local(reg) => *reg,
                _ => c.fs_mut().usable_reg(),
            };
            match values.get(i) {
                Some(Expr::Call { callee, args }) if Some(i) == last => {
                    let want = (targets.len() - values.len() + 1) as i32;
                    compile_call_expr(c, callee, args, dest, want)?;
                    tail_reg = Some(dest);
                }
                Some(e) => compile_expr_to(c, e, dest)?,
                // value list exhausted without a trailing call: pad with nil
                None => compile_expr_to(c, &Expr::Nil, dest)?,
            }
            dest
        };

        match target {
            Target::Local(_) => {}
            Target::Upvalue(idx) => pending.push(PendingStore::Upvalue {
                idx,
                value: value_reg,
            }),
            Target::Global { env, key } => pending.push(PendingStore::Global {
                env,
                key,
                value: value_reg,
            }),
        }
    }

    for store in pending {
        match store {
            PendingStore::Upvalue { idx, value } => {
                emit(c, Instruction::create_abc(OpCode::SetUpval, value, idx, 0));
            }
            PendingStore::Global { env, key, value } => {
                emit(c, Instruction::create_abc(OpCode::SetTabUp, env, key, value));
            }
        }
    }
    Ok(())
}

/// Compile `if cond then ... [else ...] end`
///
/// The test lands in a register and TEST decides whether to take the
/// forward jump over the consequent; the consequent ends with a second
/// jump over the (possibly empty) alternate.
fn compile_if_stat(
    c: &mut Codegen,
    cond: &Expr,
    then_block: &Block,
    else_block: Option<&Block>,
) -> CodegenResult<()> {
    let test_reg = compile_cond_expr(c, cond)?;
    emit(c, Instruction::create_abc(OpCode::Test, test_reg, 0, 0));
    let jump_over_then = emit_jump(c);

    compile_block(c, then_block)?;
    let jump_over_else = emit_jump(c);
    patch_jump(c, jump_over_then);

    if let Some(block) = else_block {
        compile_block(c, block)?;
    }
    patch_jump(c, jump_over_else);
    Ok(())
}

/// Compile a call in statement position; no results are kept
fn compile_call_stat(c: &mut Codegen, expr: &Expr) -> CodegenResult<()> {
    match expr {
        Expr::Call { callee, args } => {
            let dest = c.fs_mut().usable_reg();
            compile_call_expr(c, callee, args, dest, 0)?;
            Ok(())
        }
        Expr::MethodCall { .. } => Err(CodegenError::Unsupported("method call")),
        _ => Err(CodegenError::Unsupported("call statement")),
    }
}

/// Compile `return e1, ..., eN`; results occupy a fresh contiguous block
fn compile_return_stat(c: &mut Codegen, exprs: &[Expr]) -> CodegenResult<()> {
    if exprs.is_empty() {
        emit(c, Instruction::create_abc(OpCode::Return, 0, 1, 0));
        return Ok(());
    }
    let first = c.fs().next_reg;
    for e in exprs {
        let reg = c.fs_mut().alloc_reg();
        compile_expr_to(c, e, reg)?;
    }
    emit(
        c,
        Instruction::create_abc(OpCode::Return, first, exprs.len() as u32 + 1, 0),
    );
    Ok(())
}

/// Compile `function name(...)` / `local function name(...)`. The body is
/// compiled before the name is bound, so a recursive reference inside the
/// body resolves as a global.
fn compile_function_stat(
    c: &mut Codegen,
    name: &SmolStr,
    is_local: bool,
    params: &[SmolStr],
    body: &Block,
) -> CodegenResult<()> {
    let proto_idx = compile_function_proto(c, params, body)?;
    let dest = c.fs_mut().usable_reg();
    if is_local {
        c.fs_mut().def_local(name.clone(), dest);
        emit(c, Instruction::create_abx(OpCode::Closure, dest, proto_idx));
    } else {
        emit(c, Instruction::create_abx(OpCode::Closure, dest, proto_idx));
        let env = env_upvalue(c);
        let key = rk_value(c, LuaValue::Str(name.clone()));
        emit(c, Instruction::create_abc(OpCode::SetTabUp, env, key, dest));
    }
    Ok(())
}
