// Lua bytecode code generator - Main module
// Lowers a parsed chunk into Lua 5.3 register-machine prototypes

mod error;
mod expr;
mod func_state;
mod helpers;
mod stmt;

pub use error::{CodegenError, CodegenResult};

use smol_str::SmolStr;

use crate::lua_ast::Block;
use crate::lua_value::{Proto, UpvalueDesc};
use crate::opcode::{Instruction, OpCode};
use func_state::FuncState;
use helpers::emit;
use stmt::compile_stat;

/// Code generator state: a flat arena of in-progress prototypes.
/// `cur` indexes the prototype currently receiving instructions; parent
/// and child links are arena indices, collapsed into a parent-owned tree
/// once generation succeeds.
pub struct Codegen {
    pub(crate) protos: Vec<FuncState>,
    pub(crate) cur: usize,
    source: SmolStr,
}

impl Codegen {
    fn new(chunk_name: &str) -> Self {
        Codegen {
            protos: vec![FuncState::new(None, -1)],
            cur: 0,
            source: SmolStr::new(chunk_name),
        }
    }

    /// Generate the prototype tree for a parsed chunk
    pub fn generate(chunk: &Block, chunk_name: &str) -> CodegenResult<Proto> {
        let mut c = Codegen::new(chunk_name);
        generate_chunk(&mut c, chunk)?;
        Ok(c.into_proto())
    }

    pub(crate) fn fs(&self) -> &FuncState {
        &self.protos[self.cur]
    }

    pub(crate) fn fs_mut(&mut self) -> &mut FuncState {
        &mut self.protos[self.cur]
    }

    /// Open a nested prototype and make it current
    pub(crate) fn new_child(&mut self) {
        let parent = self.cur;
        let proto_idx = self.protos[parent].children.len() as i32;
        let idx = self.protos.len();
        self.protos.push(FuncState::new(Some(parent), proto_idx));
        self.protos[parent].children.push(idx);
        self.cur = idx;
    }

    /// Close the current nested prototype, switch back to its parent, and
    /// return the child's slot in the parent's prototype list
    pub(crate) fn finish_child(&mut self) -> u32 {
        let proto_idx = self.fs().proto_idx as u32;
        if let Some(parent) = self.fs().parent {
            self.cur = parent;
        }
        proto_idx
    }

    /// Collapse the arena into the parent-owned output tree
    fn into_proto(mut self) -> Proto {
        build_proto(&mut self.protos, &self.source, 0)
    }
}

fn build_proto(arena: &mut [FuncState], source: &SmolStr, idx: usize) -> Proto {
    let child_ids = std::mem::take(&mut arena[idx].children);
    let protos = child_ids
        .into_iter()
        .map(|child| build_proto(arena, source, child))
        .collect();
    let fs = &mut arena[idx];
    Proto {
        code: std::mem::take(&mut fs.code),
        consts: std::mem::take(&mut fs.consts),
        locals: std::mem::take(&mut fs.locals),
        upvalues: std::mem::take(&mut fs.upvalues),
        protos,
        param_count: fs.param_count,
        is_vararg: fs.is_vararg,
        max_stack: fs.max_stack,
        source: source.clone(),
    }
}

/// Generate code for the root chunk
fn generate_chunk(c: &mut Codegen, chunk: &Block) -> CodegenResult<()> {
    // _ENV is upvalue 0 of the root prototype; global accesses in nested
    // prototypes resolve it lazily through the chain
    c.fs_mut().upvalues.push(UpvalueDesc {
        name: SmolStr::new_static("_ENV"),
        in_stack: true,
        idx: 0,
    });
    c.fs_mut().is_vararg = true;

    compile_block(c, chunk)?;

    // Implicit return; an explicit trailing return leaves this as dead code
    emit(c, Instruction::create_abc(OpCode::Return, 0, 1, 0));
    Ok(())
}

/// Compile a block of statements
pub(crate) fn compile_block(c: &mut Codegen, block: &Block) -> CodegenResult<()> {
    for stat in &block.stats {
        compile_stat(c, stat)?;
    }
    Ok(())
}
