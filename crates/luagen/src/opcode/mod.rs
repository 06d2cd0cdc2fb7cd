mod instruction;

pub use instruction::Instruction;

/// Instruction format modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpMode {
    IABC,
    IABx,
    IAsBx,
    IAx,
}

/// Complete Lua 5.3 opcode set (47 opcodes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    // Load/Move operations
    Move = 0, // R(A) := R(B)
    LoadK,    // R(A) := K(Bx)
    LoadKX,   // R(A) := K(extra arg)
    LoadBool, // R(A) := (Bool)B; if (C) pc++
    LoadNil,  // R(A), R(A+1), ..., R(A+B) := nil

    // Upvalue operations
    GetUpval, // R(A) := UpValue[B]

    // Table get operations
    GetTabUp, // R(A) := UpValue[B][RK(C)]
    GetTable, // R(A) := R(B)[RK(C)]

    // Table set operations
    SetTabUp, // UpValue[A][RK(B)] := RK(C)
    SetUpval, // UpValue[B] := R(A)
    SetTable, // R(A)[RK(B)] := RK(C)

    // Table creation
    NewTable, // R(A) := {} (size = B,C)

    // Self call
    Self_, // R(A+1) := R(B); R(A) := R(B)[RK(C)]

    // Arithmetic operations
    Add,  // R(A) := RK(B) + RK(C)
    Sub,  // R(A) := RK(B) - RK(C)
    Mul,  // R(A) := RK(B) * RK(C)
    Mod,  // R(A) := RK(B) % RK(C)
    Pow,  // R(A) := RK(B) ^ RK(C)
    Div,  // R(A) := RK(B) / RK(C)
    IDiv, // R(A) := RK(B) // RK(C)

    // Bitwise operations
    BAnd, // R(A) := RK(B) & RK(C)
    BOr,  // R(A) := RK(B) | RK(C)
    BXor, // R(A) := RK(B) ~ RK(C)
    Shl,  // R(A) := RK(B) << RK(C)
    Shr,  // R(A) := RK(B) >> RK(C)

    // Unary operations
    Unm,  // R(A) := -R(B)
    BNot, // R(A) := ~R(B)
    Not,  // R(A) := not R(B)
    Len,  // R(A) := length of R(B)

    // Concatenation
    Concat, // R(A) := R(B).. ... ..R(C)

    // Jump
    Jmp, // pc += sBx; if (A) close all upvalues >= R(A-1)

    // Comparison operations
    Eq, // if ((RK(B) == RK(C)) ~= A) then pc++
    Lt, // if ((RK(B) <  RK(C)) ~= A) then pc++
    Le, // if ((RK(B) <= RK(C)) ~= A) then pc++

    // Test operations
    Test,    // if not (R(A) <=> C) then pc++
    TestSet, // if (R(B) <=> C) then R(A) := R(B) else pc++

    // Call operations
    Call,     // R(A), ..., R(A+C-2) := R(A)(R(A+1), ..., R(A+B-1))
    TailCall, // return R(A)(R(A+1), ..., R(A+B-1))

    // Return
    Return, // return R(A), ..., R(A+B-2)

    // For loops
    ForLoop, // R(A) += R(A+2); if R(A) <?= R(A+1) then { pc += sBx; R(A+3) := R(A) }
    ForPrep, // R(A) -= R(A+2); pc += sBx

    // Generic for loops
    TForCall, // R(A+3), ..., R(A+2+C) := R(A)(R(A+1), R(A+2))
    TForLoop, // if R(A+1) ~= nil then { R(A) := R(A+1); pc += sBx }

    // Table list initialization
    SetList, // R(A)[(C-1)*FPF+i] := R(A+i), 1 <= i <= B

    // Closure creation
    Closure, // R(A) := closure(KPROTO[Bx])

    // Vararg
    Vararg, // R(A), R(A+1), ..., R(A+B-2) = vararg

    // Extra argument
    ExtraArg, // extra (larger) argument for previous opcode
}

impl OpCode {
    #[inline(always)]
    pub fn from_u8(byte: u8) -> Self {
        unsafe { std::mem::transmute(byte) }
    }

    /// Get the instruction format mode for this opcode
    /// Based on Lua 5.3 lopcodes.c luaP_opmodes table
    pub fn get_mode(self) -> OpMode {
        use OpCode::*;
        match self {
            // iABx format (unsigned Bx)
            LoadK | LoadKX | Closure => OpMode::IABx,

            // iAsBx format (signed Bx)
            Jmp | ForLoop | ForPrep | TForLoop => OpMode::IAsBx,

            // iAx format
            ExtraArg => OpMode::IAx,

            // iABC format (everything else)
            _ => OpMode::IABC,
        }
    }
}
