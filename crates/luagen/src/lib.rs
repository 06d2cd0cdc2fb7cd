// Lua bytecode code generation
// Lowers a parsed Lua 5.3 chunk into register-machine prototypes

#[cfg(test)]
mod test;

pub mod compiler;
pub mod lua_ast;
pub mod lua_value;
pub mod opcode;

pub use compiler::{Codegen, CodegenError, CodegenResult};
pub use lua_value::{Local, LuaValue, Proto, UpvalueDesc};
pub use opcode::{Instruction, OpCode, OpMode};

/// Main entry point: generate the prototype tree for a parsed chunk
pub fn generate(chunk: &lua_ast::Block, chunk_name: &str) -> CodegenResult<Proto> {
    Codegen::generate(chunk, chunk_name)
}
