// Per-function compilation state.

use ahash::AHashMap;
use smol_str::SmolStr;

use crate::lua_value::{Local, LuaValue, UpvalueDesc};

/// Mutable state of one prototype while its body is being generated.
/// Cells live in the Codegen arena; `parent` and `children` are arena
/// indices so an inner function can append captures to every enclosing
/// prototype during upvalue resolution.
pub(crate) struct FuncState {
    pub parent: Option<usize>,
    /// Slot in the parent's prototype list; -1 for the root
    pub proto_idx: i32,
    pub children: Vec<usize>,
    pub code: Vec<u32>,
    pub consts: Vec<LuaValue>,
    const_index: AHashMap<LuaValue, u32>,
    pub locals: Vec<Local>,
    pub upvalues: Vec<UpvalueDesc>,
    /// Next register to hand out
    pub next_reg: u32,
    /// Reclaimed temporaries. Plumbed but never fed by the current
    /// generator; kept as the reclamation channel for register reuse.
    pub free_regs: Vec<u32>,
    pub param_count: usize,
    pub is_vararg: bool,
    /// Register high-water mark; reference Lua floors this at 2
    pub max_stack: usize,
}

impl FuncState {
    pub fn new(parent: Option<usize>, proto_idx: i32) -> Self {
        FuncState {
            parent,
            proto_idx,
            children: Vec::new(),
            code: Vec::new(),
            consts: Vec::new(),
            const_index: AHashMap::new(),
            locals: Vec::new(),
            upvalues: Vec::new(),
            next_reg: 0,
            free_regs: Vec::new(),
            param_count: 0,
            is_vararg: false,
            max_stack: 2,
        }
    }

    /// Hand out the next register
    pub fn alloc_reg(&mut self) -> u32 {
        let reg = self.next_reg;
        self.next_reg += 1;
        if self.next_reg as usize > self.max_stack {
            self.max_stack = self.next_reg as usize;
        }
        reg
    }

    /// Prefer a reclaimed temporary, fall back to a fresh register
    pub fn usable_reg(&mut self) -> u32 {
        if let Some(reg) = self.free_regs.pop() {
            reg
        } else {
            self.alloc_reg()
        }
    }

    /// Return a temporary to the reclamation pool
    #[allow(dead_code)]
    pub fn free_reg(&mut self, reg: u32) {
        self.free_regs.push(reg);
    }

    /// Rewind the register high-water mark (used after a CALL once the
    /// actual result count is known)
    pub fn set_next_reg(&mut self, n: u32) {
        self.next_reg = n;
    }

    /// Declare a local bound to `reg`; declaration order is preserved on
    /// the output prototype
    pub fn def_local(&mut self, name: SmolStr, reg: u32) {
        self.locals.push(Local { name, reg });
    }

    /// Register of a declared local; the latest declaration wins
    pub fn local_reg(&self, name: &str) -> Option<u32> {
        self.locals.iter().rev().find(|l| l.name == name).map(|l| l.reg)
    }

    /// Intern a constant: the existing index if an equal value is pooled,
    /// else append
    pub fn intern(&mut self, value: LuaValue) -> u32 {
        if let Some(&idx) = self.const_index.get(&value) {
            return idx;
        }
        let idx = self.consts.len() as u32;
        self.consts.push(value.clone());
        self.const_index.insert(value, idx);
        idx
    }

    /// Index of an already-captured upvalue
    pub fn find_upvalue(&self, name: &str) -> Option<u32> {
        self.upvalues
            .iter()
            .position(|uv| uv.name == name)
            .map(|i| i as u32)
    }

    pub fn add_upvalue(&mut self, desc: UpvalueDesc) -> u32 {
        self.upvalues.push(desc);
        (self.upvalues.len() - 1) as u32
    }
}
