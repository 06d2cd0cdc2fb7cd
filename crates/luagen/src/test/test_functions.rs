// Nested prototypes, closures, and upvalue resolution

use pretty_assertions::assert_eq;

use smol_str::SmolStr;

use super::helpers::*;
use crate::lua_ast::{BinOp, Block, Expr, Stat};
use crate::lua_value::LuaValue;
use crate::opcode::OpCode;

fn function_stat(name: &str, is_local: bool, params: &[&str], body: Vec<Stat>) -> Stat {
    Stat::Function {
        name: SmolStr::new(name),
        is_local,
        params: names(params),
        body: Block::new(body),
    }
}

#[test]
fn test_local_function_declaration() {
    // local function f(x) return x + 1 end
    let proto = generate(vec![function_stat(
        "f",
        true,
        &["x"],
        vec![Stat::Return(vec![binary(BinOp::Add, name("x"), num(1.0))])],
    )]);

    assert_eq!(abx(proto.code[0]), (OpCode::Closure, 0, 0));
    assert_eq!(abc(proto.code[1]), (OpCode::Return, 0, 1, 0));
    assert_eq!(proto.locals.len(), 1);
    assert_eq!((proto.locals[0].name.as_str(), proto.locals[0].reg), ("f", 0));

    assert_eq!(proto.protos.len(), 1);
    let f = &proto.protos[0];
    assert_eq!(f.param_count, 1);
    assert!(!f.is_vararg);
    assert_eq!((f.locals[0].name.as_str(), f.locals[0].reg), ("x", 0));
    assert_eq!(f.consts, vec![LuaValue::number(1.0)]);
    assert_eq!(abc(f.code[0]), (OpCode::Add, 1, 0, rk(0)));
    assert_eq!(abc(f.code[1]), (OpCode::Return, 1, 2, 0));
    // the implicit return follows the explicit one
    assert_eq!(abc(f.code[2]), (OpCode::Return, 0, 1, 0));
}

#[test]
fn test_global_function_declaration() {
    // function g() end
    let proto = generate(vec![function_stat("g", false, &[], vec![])]);

    assert_eq!(proto.consts, vec![LuaValue::string("g")]);
    assert_eq!(abx(proto.code[0]), (OpCode::Closure, 0, 0));
    assert_eq!(abc(proto.code[1]), (OpCode::SetTabUp, 0, rk(0), 0));
    assert!(proto.locals.is_empty());
    assert_eq!(proto.protos[0].code.len(), 1);
}

#[test]
fn test_function_expression() {
    // local f = function(a, b) return b end
    let proto = generate(vec![local(
        &["f"],
        vec![Expr::Function {
            params: names(&["a", "b"]),
            body: Block::new(vec![Stat::Return(vec![name("b")])]),
        }],
    )]);

    assert_eq!(abx(proto.code[0]), (OpCode::Closure, 0, 0));
    let f = &proto.protos[0];
    assert_eq!(f.param_count, 2);
    assert_eq!(abc(f.code[0]), (OpCode::Move, 2, 1, 0));
    assert_eq!(abc(f.code[1]), (OpCode::Return, 2, 2, 0));
}

#[test]
fn test_upvalue_captures_parent_local() {
    // local function outer()
    //   local y = 1
    //   local function inner() return y end
    // end
    let proto = generate(vec![function_stat(
        "outer",
        true,
        &[],
        vec![
            local(&["y"], vec![num(1.0)]),
            function_stat("inner", true, &[], vec![Stat::Return(vec![name("y")])]),
        ],
    )]);

    let outer = &proto.protos[0];
    assert_eq!(abx(outer.code[0]), (OpCode::LoadK, 0, 0));
    assert_eq!(abx(outer.code[1]), (OpCode::Closure, 1, 0));

    let inner = &outer.protos[0];
    assert_eq!(inner.upvalues.len(), 1);
    assert_eq!(inner.upvalues[0].name, "y");
    assert!(inner.upvalues[0].in_stack);
    assert_eq!(inner.upvalues[0].idx, 0);
    assert_eq!(abc(inner.code[0]), (OpCode::GetUpval, 0, 0, 0));
    assert_eq!(abc(inner.code[1]), (OpCode::Return, 0, 2, 0));
}

#[test]
fn test_upvalue_chain_through_intermediate_prototype() {
    // local function f()
    //   local v = 1
    //   local function g()
    //     local function h() return v end
    //   end
    // end
    let proto = generate(vec![function_stat(
        "f",
        true,
        &[],
        vec![
            local(&["v"], vec![num(1.0)]),
            function_stat(
                "g",
                true,
                &[],
                vec![function_stat(
                    "h",
                    true,
                    &[],
                    vec![Stat::Return(vec![name("v")])],
                )],
            ),
        ],
    )]);

    let f = &proto.protos[0];
    let g = &f.protos[0];
    let h = &g.protos[0];

    // the frame directly above the captured local takes it from the stack
    assert_eq!(g.upvalues.len(), 1);
    assert_eq!(g.upvalues[0].name, "v");
    assert!(g.upvalues[0].in_stack);
    assert_eq!(g.upvalues[0].idx, 0);

    // lower frames reference their parent's upvalue
    assert_eq!(h.upvalues.len(), 1);
    assert_eq!(h.upvalues[0].name, "v");
    assert!(!h.upvalues[0].in_stack);
    assert_eq!(h.upvalues[0].idx, 0);

    assert_eq!(abc(h.code[0]), (OpCode::GetUpval, 0, 0, 0));
}

#[test]
fn test_upvalue_resolution_is_idempotent() {
    // local function outer()
    //   local y = 1
    //   local function inner() return y, y end
    // end
    let proto = generate(vec![function_stat(
        "outer",
        true,
        &[],
        vec![
            local(&["y"], vec![num(1.0)]),
            function_stat(
                "inner",
                true,
                &[],
                vec![Stat::Return(vec![name("y"), name("y")])],
            ),
        ],
    )]);

    let inner = &proto.protos[0].protos[0];
    assert_eq!(inner.upvalues.len(), 1);
    assert_eq!(abc(inner.code[0]), (OpCode::GetUpval, 0, 0, 0));
    assert_eq!(abc(inner.code[1]), (OpCode::GetUpval, 1, 0, 0));
    assert_eq!(abc(inner.code[2]), (OpCode::Return, 0, 3, 0));
}

#[test]
fn test_nested_global_access_propagates_env() {
    // local function f() x = 1 end
    let proto = generate(vec![function_stat(
        "f",
        true,
        &[],
        vec![assign(&["x"], vec![num(1.0)])],
    )]);

    let f = &proto.protos[0];
    // _ENV re-captured from the root's upvalue, not from the stack
    assert_eq!(f.upvalues.len(), 1);
    assert_eq!(f.upvalues[0].name, "_ENV");
    assert!(!f.upvalues[0].in_stack);
    assert_eq!(f.upvalues[0].idx, 0);

    assert_eq!(abx(f.code[0]), (OpCode::LoadK, 0, 1));
    assert_eq!(abc(f.code[1]), (OpCode::SetTabUp, 0, rk(0), 0));
}

#[test]
fn test_local_function_name_binds_after_body() {
    // local function r() r() end -- the inner reference resolves as a global
    let proto = generate(vec![function_stat(
        "r",
        true,
        &[],
        vec![Stat::Call(call(name("r"), vec![]))],
    )]);

    let r = &proto.protos[0];
    assert_eq!(r.consts, vec![LuaValue::string("r")]);
    assert_eq!(abc(r.code[0]), (OpCode::GetTabUp, 0, 0, rk(0)));
    assert_eq!(abc(r.code[1]), (OpCode::Call, 0, 1, 1));
}

#[test]
fn test_assignment_to_upvalue_defers_setupval() {
    // local function outer()
    //   local v = 1
    //   local function set() v = 2 end
    // end
    let proto = generate(vec![function_stat(
        "outer",
        true,
        &[],
        vec![
            local(&["v"], vec![num(1.0)]),
            function_stat("set", true, &[], vec![assign(&["v"], vec![num(2.0)])]),
        ],
    )]);

    let set = &proto.protos[0].protos[0];
    assert_eq!(set.upvalues[0].name, "v");
    assert_eq!(abx(set.code[0]), (OpCode::LoadK, 0, 0));
    assert_eq!(abc(set.code[1]), (OpCode::SetUpval, 0, 0, 0));
}

#[test]
fn test_upvalue_names_are_unique_per_prototype() {
    // local function f() local y = 1
    //   local function g() y = y + 1; x = y end
    // end
    let proto = generate(vec![function_stat(
        "f",
        true,
        &[],
        vec![
            local(&["y"], vec![num(1.0)]),
            function_stat(
                "g",
                true,
                &[],
                vec![
                    assign(&["y"], vec![binary(BinOp::Add, name("y"), num(1.0))]),
                    assign(&["x"], vec![name("y")]),
                ],
            ),
        ],
    )]);

    let g = &proto.protos[0].protos[0];
    let mut seen = std::collections::HashSet::new();
    for uv in &g.upvalues {
        assert!(seen.insert(uv.name.clone()));
    }
    assert!(g.upvalues.len() <= 256);
    // y first (target resolution), then _ENV for the global x
    assert_eq!(g.upvalues[0].name, "y");
    assert_eq!(g.upvalues[1].name, "_ENV");
}
