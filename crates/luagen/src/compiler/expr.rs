// Expression lowering

use smol_str::SmolStr;

use super::error::{CodegenError, CodegenResult};
use super::helpers::*;
use super::{compile_block, Codegen};
use crate::lua_ast::{BinOp, Block, Expr, UnOp};
use crate::lua_value::LuaValue;
use crate::opcode::{Instruction, OpCode};

/// Compile an expression with no caller preference and return the register
/// holding the result. A local variable reference yields its own register;
/// everything else materializes into a fresh temporary.
pub(crate) fn compile_expr(c: &mut Codegen, e: &Expr) -> CodegenResult<u32> {
    match e {
        Expr::Name(name) => {
            if let Some(reg) = c.fs().local_reg(name) {
                return Ok(reg);
            }
            let dest = c.fs_mut().usable_reg();
            compile_name_expr(c, name, dest)?;
            Ok(dest)
        }
        Expr::Call { callee, args } => {
            let dest = c.fs_mut().usable_reg();
            compile_call_expr(c, callee, args, dest, 1)
        }
        _ => {
            let dest = c.fs_mut().usable_reg();
            compile_expr_to(c, e, dest)?;
            Ok(dest)
        }
    }
}

/// Compile an expression so its single result lands in `dest`
pub(crate) fn compile_expr_to(c: &mut Codegen, e: &Expr, dest: u32) -> CodegenResult<()> {
    match e {
        Expr::Nil => {
            emit(c, Instruction::create_abc(OpCode::LoadNil, dest, 0, 0));
            Ok(())
        }
        Expr::True => {
            emit(c, Instruction::create_abc(OpCode::LoadBool, dest, 1, 0));
            Ok(())
        }
        Expr::False => {
            emit(c, Instruction::create_abc(OpCode::LoadBool, dest, 0, 0));
            Ok(())
        }
        Expr::Number(n) => {
            let idx = add_constant(c, LuaValue::Number(*n));
            emit(c, Instruction::create_abx(OpCode::LoadK, dest, idx));
            Ok(())
        }
        Expr::Str(s) => {
            let idx = add_constant(c, LuaValue::Str(s.clone()));
            emit(c, Instruction::create_abx(OpCode::LoadK, dest, idx));
            Ok(())
        }
        Expr::Name(name) => compile_name_expr(c, name, dest),
        Expr::Binary { op, lhs, rhs } => compile_binary_expr(c, *op, lhs, rhs, dest),
        Expr::Unary { op, operand } => {
            let reg = compile_expr(c, operand)?;
            let opcode = match op {
                UnOp::Neg => OpCode::Unm,
                UnOp::Not => OpCode::Not,
                UnOp::Len => OpCode::Len,
            };
            emit(c, Instruction::create_abc(opcode, dest, reg, 0));
            Ok(())
        }
        Expr::Call { callee, args } => {
            compile_call_expr(c, callee, args, dest, 1)?;
            Ok(())
        }
        Expr::Function { params, body } => {
            let proto_idx = compile_function_proto(c, params, body)?;
            emit(c, Instruction::create_abx(OpCode::Closure, dest, proto_idx));
            Ok(())
        }
        Expr::Vararg => Err(CodegenError::Unsupported("vararg expression")),
        Expr::Index { .. } => Err(CodegenError::Unsupported("index expression")),
        Expr::MethodCall { .. } => Err(CodegenError::Unsupported("method call")),
        Expr::Table(_) => Err(CodegenError::Unsupported("table constructor")),
    }
}

/// Compile an identifier rvalue into `dest`: a MOVE from a local, a
/// GETUPVAL through the resolver, or a GETTABUP through `_ENV`
fn compile_name_expr(c: &mut Codegen, name: &SmolStr, dest: u32) -> CodegenResult<()> {
    if let Some(reg) = c.fs().local_reg(name) {
        emit(c, Instruction::create_abc(OpCode::Move, dest, reg, 0));
        return Ok(());
    }
    if let Some(idx) = resolve_upvalue(c, name) {
        emit(c, Instruction::create_abc(OpCode::GetUpval, dest, idx, 0));
        return Ok(());
    }
    let env = env_upvalue(c);
    let key = rk_value(c, LuaValue::Str(name.clone()));
    emit(c, Instruction::create_abc(OpCode::GetTabUp, dest, env, key));
    Ok(())
}

/// RK operand: literal numbers and strings go through the constant pool
/// with the K bit; anything else is evaluated into a register
fn rk_operand(c: &mut Codegen, e: &Expr) -> CodegenResult<u32> {
    match e {
        Expr::Number(n) => Ok(rk_value(c, LuaValue::Number(*n))),
        Expr::Str(s) => Ok(rk_value(c, LuaValue::Str(s.clone()))),
        _ => compile_expr(c, e),
    }
}

/// EQ/LT/LE opcode and expected-outcome flag for a comparison operator.
/// `>` and `>=` keep their textual operand order; the flipped flag
/// expresses the negation.
fn comparison_parts(op: BinOp) -> Option<(OpCode, u32)> {
    match op {
        BinOp::Eq => Some((OpCode::Eq, 1)),
        BinOp::Ne => Some((OpCode::Eq, 0)),
        BinOp::Lt => Some((OpCode::Lt, 1)),
        BinOp::Le => Some((OpCode::Le, 1)),
        BinOp::Gt => Some((OpCode::Lt, 0)),
        BinOp::Ge => Some((OpCode::Le, 0)),
        _ => None,
    }
}

/// Emit the compare instruction alone and return the register feeding its
/// left operand (the conditional context tests that register directly)
fn compile_comparison(
    c: &mut Codegen,
    opcode: OpCode,
    expect: u32,
    lhs: &Expr,
    rhs: &Expr,
) -> CodegenResult<u32> {
    let b = rk_operand(c, lhs)?;
    let cc = rk_operand(c, rhs)?;
    emit(c, Instruction::create_abc(opcode, expect, b, cc));
    Ok(if Instruction::is_k(b) { 0 } else { b })
}

/// Compile an if-statement test and return the register for the TEST that
/// follows. Comparisons emit only the compare; everything else
/// materializes a value.
pub(crate) fn compile_cond_expr(c: &mut Codegen, e: &Expr) -> CodegenResult<u32> {
    if let Expr::Binary { op, lhs, rhs } = e {
        if let Some((opcode, expect)) = comparison_parts(*op) {
            return compile_comparison(c, opcode, expect, lhs, rhs);
        }
    }
    compile_expr(c, e)
}

fn compile_binary_expr(
    c: &mut Codegen,
    op: BinOp,
    lhs: &Expr,
    rhs: &Expr,
    dest: u32,
) -> CodegenResult<()> {
    let opcode = match op {
        BinOp::Add => OpCode::Add,
        BinOp::Sub => OpCode::Sub,
        BinOp::Mul => OpCode::Mul,
        BinOp::Div => OpCode::Div,
        BinOp::Mod => OpCode::Mod,
        BinOp::Pow => OpCode::Pow,
        BinOp::Concat => {
            // CONCAT operands are plain registers, never RK
            let b = compile_expr(c, lhs)?;
            let cc = compile_expr(c, rhs)?;
            emit(c, Instruction::create_abc(OpCode::Concat, dest, b, cc));
            return Ok(());
        }
        BinOp::And | BinOp::Or => return compile_logical(c, op, lhs, rhs, dest),
        BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            if let Some((opcode, expect)) = comparison_parts(op) {
                compile_comparison(c, opcode, expect, lhs, rhs)?;
                // materialize the boolean: the compare falls through to the
                // JMP exactly when its outcome matches the expected flag
                emit(c, Instruction::create_asbx(OpCode::Jmp, 0, 1));
                emit(c, Instruction::create_abc(OpCode::LoadBool, dest, 0, 1));
                emit(c, Instruction::create_abc(OpCode::LoadBool, dest, 1, 0));
            }
            return Ok(());
        }
    };

    let b = rk_operand(c, lhs)?;
    let cc = rk_operand(c, rhs)?;
    emit(c, Instruction::create_abc(opcode, dest, b, cc));
    Ok(())
}

/// `and`/`or` select between two eagerly evaluated operands: TESTSET
/// copies the left value and skips the MOVE when it decides the result,
/// otherwise the right value is moved in
fn compile_logical(
    c: &mut Codegen,
    op: BinOp,
    lhs: &Expr,
    rhs: &Expr,
    dest: u32,
) -> CodegenResult<()> {
    let left = compile_expr(c, lhs)?;
    let right = compile_expr(c, rhs)?;
    let k = if op == BinOp::And { 0 } else { 1 };
    emit(c, Instruction::create_abc(OpCode::TestSet, dest, left, k));
    emit(c, Instruction::create_asbx(OpCode::Jmp, 0, 1));
    emit(c, Instruction::create_abc(OpCode::Move, dest, right, 0));
    Ok(())
}

/// Lower a call. `dest` receives the callable and the primary result;
/// `want` is the caller's result expectation (-1 all results, 0 none,
/// n exactly n). Returns the call register.
pub(crate) fn compile_call_expr(
    c: &mut Codegen,
    callee: &Expr,
    args: &[Expr],
    dest: u32,
    want: i32,
) -> CodegenResult<u32> {
    compile_expr_to(c, callee, dest)?;

    let b = if args.is_empty() {
        1
    } else {
        let last = args.len() - 1;
        let mut open_tail = false;
        for (i, arg) in args.iter().enumerate() {
            // arguments form a contiguous block above the callable
            let reg = c.fs_mut().alloc_reg();
            match arg {
                Expr::Call { callee, args } if i == last => {
                    compile_call_expr(c, callee, args, reg, -1)?;
                    open_tail = true;
                }
                _ => compile_expr_to(c, arg, reg)?,
            }
        }
        if open_tail { 0 } else { args.len() as u32 + 1 }
    };

    let cc = match want {
        -1 => 0,
        0 => 1,
        n => {
            // subsequent code may overwrite the tail of the call window
            c.fs_mut().set_next_reg(dest + n as u32);
            n as u32 + 1
        }
    };
    emit(c, Instruction::create_abc(OpCode::Call, dest, b, cc));
    Ok(dest)
}

/// Compile a function body into a nested prototype and return its slot in
/// the parent's prototype list
pub(crate) fn compile_function_proto(
    c: &mut Codegen,
    params: &[SmolStr],
    body: &Block,
) -> CodegenResult<u32> {
    c.new_child();
    c.fs_mut().param_count = params.len();
    for param in params {
        let reg = c.fs_mut().alloc_reg();
        c.fs_mut().def_local(param.clone(), reg);
    }
    compile_block(c, body)?;
    emit(c, Instruction::create_abc(OpCode::Return, 0, 1, 0));
    Ok(c.finish_child())
}
