use super::*;

use std::cell::RefCell;
use std::rc::Rc;

use crate::ast::BinaryOp;

fn l() -> Loc {
    Loc::default()
}

fn code(ops: Vec<Op>) -> Bytecode {
    Bytecode::new(vec![ops.into_iter().map(|op| (op, l())).collect()])
}

fn vm(ops: Vec<Op>) -> VM {
    VM::new(code(ops))
}

/// Write sink shared between the test and the VM that owns it.
#[derive(Clone, Default)]
struct Sink(Rc<RefCell<Vec<u8>>>);

impl io::Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Sink {
    fn contents(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).unwrap()
    }
}

fn run_capturing(code: Bytecode) -> (Result<Value>, String) {
    let sink = Sink::default();
    let mut vm = VM::with_output(code, Box::new(sink.clone()));
    let res = vm.run();
    (res, sink.contents())
}

fn error_kind(e: &failure::Error) -> ErrorKind {
    execution_error(e).expect("expected an ExecutionError").kind
}

#[test]
fn test_bytecode_errors() {
    let empty = Bytecode::new(vec![]);
    assert!(empty.addr((0, 0)).is_err());

    let single = code(vec![Op::Halt]);
    let maybe_halt = single.addr((0, 0));
    assert!(maybe_halt.is_ok());
    assert_eq!(maybe_halt.unwrap().op, Op::Halt);
    assert!(single.addr((0, 1)).is_err());
    assert!(single.addr((1, 0)).is_err());
}

#[test]
fn test_op_put() {
    let mut vm = vm(vec![]);

    vm.op_put(&Value::Int(0)).unwrap();
    assert_eq!(*vm.stack.last().unwrap(), Value::Int(0));
}

#[test]
fn test_op_get() {
    let mut vm = vm(vec![]);

    let env = vm
        .environment
        .peek()
        .unwrap()
        .with_values(vec![("test".to_string(), 0.into())]);
    vm.environment.push(env);

    vm.op_get("test", &l()).unwrap();
    assert_eq!(*vm.stack.last().unwrap(), Value::Int(0));

    let e = vm.op_get("missing", &l()).unwrap_err();
    assert_eq!(error_kind(&e), ErrorKind::UnknownVariable);
}

#[test]
fn test_op_write_keeps_value() {
    let sink = Sink::default();
    let mut vm = VM::with_output(code(vec![]), Box::new(sink.clone()));

    vm.op_put(&Value::Str("hello".to_string())).unwrap();
    vm.op_write().unwrap();

    assert_eq!(sink.contents(), "hello\n");
    assert_eq!(vm.stack.len(), 1);
}

#[test]
fn test_op_operation() {
    let mut vm = vm(vec![]);

    vm.op_put(&Value::Int(2)).unwrap();
    vm.op_put(&Value::Int(5)).unwrap();
    vm.op_operation(BinaryOp::Sub, &l()).unwrap();

    assert_eq!(*vm.stack.last().unwrap(), Value::Int(-3));
}

#[test]
fn test_op_jump_if_false() {
    let mut vm = vm(vec![]);

    vm.op_put(&Value::Bool(true)).unwrap();
    assert_eq!(
        vm.op_jump_if_false(7, (0, 0), &l()).unwrap(),
        Step::Advance
    );

    vm.op_put(&Value::Bool(false)).unwrap();
    assert_eq!(
        vm.op_jump_if_false(7, (0, 0), &l()).unwrap(),
        Step::Goto((0, 7))
    );

    vm.op_put(&Value::Int(1)).unwrap();
    let e = vm.op_jump_if_false(7, (0, 0), &l()).unwrap_err();
    assert_eq!(error_kind(&e), ErrorKind::TypeError);
}

#[test]
fn test_op_allocate() {
    let mut vm = vm(vec![]);

    vm.op_put(&Value::Int(1)).unwrap();
    vm.op_put(&Value::Int(2)).unwrap();
    vm.call_stack.push(CallFrame {
        ret: (0, 0),
        arity: 2,
    });

    vm.op_allocate(&["a".to_string(), "b".to_string()], &l())
        .unwrap();

    assert!(vm.stack.is_empty());
    assert_eq!(vm.environment.depth(), 2);
    let env = vm.environment.peek().unwrap();
    assert_eq!(*env.get("a").unwrap(), Value::Int(1));
    assert_eq!(*env.get("b").unwrap(), Value::Int(2));
}

#[test]
fn test_op_allocate_arity_mismatch() {
    let mut vm = vm(vec![]);

    vm.op_put(&Value::Int(1)).unwrap();
    vm.call_stack.push(CallFrame {
        ret: (0, 0),
        arity: 1,
    });

    let e = vm
        .op_allocate(&["a".to_string(), "b".to_string()], &l())
        .unwrap_err();
    assert_eq!(error_kind(&e), ErrorKind::ArityError);
}

#[test]
fn test_op_let_allocate_patches_closure() {
    let mut vm = vm(vec![]);

    vm.op_close_over(3).unwrap();
    let closure = match vm.stack.last().unwrap().clone() {
        Value::Closure(c) => c,
        other => panic!("expected closure, got {:?}", other),
    };
    assert!(closure.borrow().env.get("f").is_none());

    vm.op_let_allocate("f").unwrap();

    // The captured environment now contains the binding itself.
    let captured = closure.borrow().env.clone();
    match captured.get("f") {
        Some(Value::Closure(inner)) => assert!(Rc::ptr_eq(inner, &closure)),
        other => panic!("expected the closure bound to f, got {:?}", other),
    }
}

#[test]
fn test_op_let_allocate_plain_value() {
    let mut vm = vm(vec![]);

    vm.op_put(&Value::Int(9)).unwrap();
    vm.op_let_allocate("x").unwrap();

    assert_eq!(vm.environment.depth(), 2);
    assert_eq!(
        *vm.environment.peek().unwrap().get("x").unwrap(),
        Value::Int(9)
    );

    vm.op_deallocate().unwrap();
    assert_eq!(vm.environment.depth(), 1);
}

#[test]
fn test_op_invoke_and_proceed() {
    let mut vm = vm(vec![]);

    vm.op_put(&Value::Int(5)).unwrap();
    vm.op_close_over(2).unwrap();

    let step = vm.op_invoke(1, (0, 7), &l()).unwrap();
    assert_eq!(step, Step::Goto((2, 0)));
    assert_eq!(vm.environment.depth(), 2);
    assert_eq!(
        *vm.call_stack.last().unwrap(),
        CallFrame {
            ret: (0, 8),
            arity: 1
        }
    );

    let step = vm.op_proceed().unwrap();
    assert_eq!(step, Step::Goto((0, 8)));
    assert_eq!(vm.environment.depth(), 1);
    assert!(vm.call_stack.is_empty());
}

#[test]
fn test_op_invoke_non_callable() {
    let mut vm = vm(vec![]);

    vm.op_put(&Value::Int(5)).unwrap();
    let e = vm.op_invoke(0, (0, 0), &l()).unwrap_err();
    assert_eq!(error_kind(&e), ErrorKind::TypeError);
}

#[test]
fn test_op_pair_projections() {
    let mut vm = vm(vec![]);

    vm.op_put(&Value::Int(1)).unwrap();
    vm.op_put(&Value::Int(2)).unwrap();
    vm.op_pair().unwrap();

    assert_eq!(
        *vm.stack.last().unwrap(),
        Value::pair(1.into(), 2.into())
    );
}

#[test]
fn test_op_first_second() {
    let mut vm = vm(vec![]);

    vm.op_put(&Value::pair(1.into(), 2.into())).unwrap();
    vm.op_first(&l()).unwrap();
    assert_eq!(*vm.stack.last().unwrap(), Value::Int(1));

    vm.op_put(&Value::pair(1.into(), 2.into())).unwrap();
    vm.op_second(&l()).unwrap();
    assert_eq!(*vm.stack.last().unwrap(), Value::Int(2));

    vm.op_put(&Value::Int(3)).unwrap();
    let e = vm.op_first(&l()).unwrap_err();
    assert_eq!(error_kind(&e), ErrorKind::TypeError);
}

#[test]
fn test_run_simple() {
    let (res, out) = run_capturing(code(vec![
        Op::Put(Value::Int(1)),
        Op::Put(Value::Int(2)),
        Op::Operation(BinaryOp::Add),
        Op::Write,
        Op::Halt,
    ]));

    assert_eq!(res.unwrap(), Value::Int(3));
    assert_eq!(out, "3\n");
}

#[test]
fn test_run_call_roundtrip() {
    // chunk 1 doubles its argument; entry calls it with 21.
    let code = Bytecode::new(vec![
        vec![
            (Op::Put(Value::Int(21)), l()),
            (Op::CloseOver(1), l()),
            (Op::Invoke(1), l()),
            (Op::Halt, l()),
        ],
        vec![
            (Op::Allocate(vec!["n".to_string()]), l()),
            (Op::Get("n".to_string()), l()),
            (Op::Put(Value::Int(2)), l()),
            (Op::Operation(BinaryOp::Mul), l()),
            (Op::Deallocate, l()),
            (Op::Proceed, l()),
        ],
    ]);

    let (res, _) = run_capturing(code);
    assert_eq!(res.unwrap(), Value::Int(42));
}

#[test]
fn test_run_resets_state() {
    let mut vm = vm(vec![Op::Put(Value::Int(1)), Op::Halt]);

    assert_eq!(vm.run().unwrap(), Value::Int(1));
    assert_eq!(vm.run().unwrap(), Value::Int(1));

    assert!(vm.stack.is_empty());
    assert_eq!(vm.environment.depth(), 1);
    assert!(vm.call_stack.is_empty());
}

#[test]
fn test_run_error_carries_location() {
    let loc = Loc::new(3, 4, "bad.rinha");
    let code = Bytecode::new(vec![vec![
        (Op::Put(Value::Int(1)), l()),
        (Op::Put(Value::Bool(true)), l()),
        (Op::Operation(BinaryOp::Add), loc.clone()),
        (Op::Halt, l()),
    ]]);

    let (res, _) = run_capturing(code);
    let e = res.unwrap_err();
    let ee = execution_error(&e).unwrap();
    assert_eq!(ee.kind, ErrorKind::TypeError);
    assert_eq!(ee.location, loc);
}

#[test]
fn test_run_stops_on_missing_address() {
    // Entry chunk without Halt runs off the end.
    let (res, _) = run_capturing(code(vec![Op::Put(Value::Int(1))]));
    assert!(res.is_err());
}
