// Shared AST builders and instruction decoders for codegen tests

use smol_str::SmolStr;

use crate::compiler::Codegen;
use crate::lua_ast::{BinOp, Block, Expr, Stat, UnOp};
use crate::lua_value::Proto;
use crate::opcode::{Instruction, OpCode};

pub fn generate(stats: Vec<Stat>) -> Proto {
    match Codegen::generate(&Block::new(stats), "test") {
        Ok(proto) => proto,
        Err(e) => panic!("codegen failed: {e}"),
    }
}

pub fn names(ns: &[&str]) -> Vec<SmolStr> {
    ns.iter().map(|n| SmolStr::new(n)).collect()
}

pub fn name(n: &str) -> Expr {
    Expr::Name(SmolStr::new(n))
}

pub fn num(n: f64) -> Expr {
    Expr::Number(n)
}

pub fn string(s: &str) -> Expr {
    Expr::Str(SmolStr::new(s))
}

pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

pub fn unary(op: UnOp, operand: Expr) -> Expr {
    Expr::Unary {
        op,
        operand: Box::new(operand),
    }
}

pub fn call(callee: Expr, args: Vec<Expr>) -> Expr {
    Expr::Call {
        callee: Box::new(callee),
        args,
    }
}

pub fn local(ns: &[&str], exprs: Vec<Expr>) -> Stat {
    Stat::Local {
        names: names(ns),
        exprs,
    }
}

pub fn assign(targets: &[&str], values: Vec<Expr>) -> Stat {
    Stat::Assign {
        targets: targets.iter().map(|t| name(t)).collect(),
        values,
    }
}

pub fn rk(idx: u32) -> u32 {
    Instruction::rk_as_k(idx)
}

/// Decode an iABC instruction
pub fn abc(instr: u32) -> (OpCode, u32, u32, u32) {
    (
        Instruction::get_opcode(instr),
        Instruction::get_a(instr),
        Instruction::get_b(instr),
        Instruction::get_c(instr),
    )
}

/// Decode an iABx instruction
pub fn abx(instr: u32) -> (OpCode, u32, u32) {
    (
        Instruction::get_opcode(instr),
        Instruction::get_a(instr),
        Instruction::get_bx(instr),
    )
}

/// Decode an iAsBx instruction
pub fn asbx(instr: u32) -> (OpCode, u32, i32) {
    (
        Instruction::get_opcode(instr),
        Instruction::get_a(instr),
        Instruction::get_sbx(instr),
    )
}

/// Opcodes of a whole code vector, for shape assertions
pub fn opcodes(proto: &Proto) -> Vec<OpCode> {
    proto.code.iter().map(|&i| Instruction::get_opcode(i)).collect()
}
