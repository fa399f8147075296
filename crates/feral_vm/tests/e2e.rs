//! End-to-end scenarios driving the full lex -> parse -> simplify ->
//! codegen -> execute pipeline through [`feral_vm::Vm::run_text`]
//! (`spec.md` §8 "Concrete end-to-end scenarios"). `io.println` is an
//! external stdlib module and out of scope, so each scenario reports its
//! result through `exit(n)` instead of stdout.

use std::path::Path;

use feral_vm::Vm;

fn run(src: &str) -> i32 {
    // Ignores the "already initialized" error from a prior test in the same
    // process; `RUST_LOG` (unset by default) gates whether anything prints.
    let _ = env_logger::try_init();
    let mut vm = Vm::new();
    vm.run_text(src, Path::new("<test>"))
}

#[test]
fn operator_precedence_folds_to_the_expected_int() {
    assert_eq!(run("exit(1 + 2 * 3);"), 7);
}

#[test]
fn string_repeat_by_int() {
    assert_eq!(
        run(
            "let s = 'ab';
             s = s * 3;
             if s == 'ababab' { exit(1); } else { exit(0); }"
        ),
        1
    );
}

#[test]
fn classic_for_loop_accumulates() {
    assert_eq!(
        run("let sum = 0; for let i = 0; i < 5; i += 1 { sum += i; } exit(sum);"),
        10
    );
}

#[test]
fn default_argument_is_used_when_omitted() {
    assert_eq!(run("fn f(x, y = 10) { return x + y; } exit(f(5));"), 15);
}

#[test]
fn keyword_argument_overrides_the_default() {
    assert_eq!(run("fn f(x, y = 10) { return x + y; } exit(f(5, y = 2));"), 7);
}

#[test]
fn for_in_over_each_visits_every_element_in_order() {
    assert_eq!(
        run(
            "let v = [1, 2, 3];
             let sum = 0;
             for x in v.each() { sum += x; }
             exit(sum);"
        ),
        6
    );
}

#[test]
fn or_handler_catches_division_by_zero_and_rebalances_the_stack() {
    assert_eq!(run("let r = (1 / 0) or e { 99 }; exit(r);"), 99);
}

#[test]
fn or_handler_without_a_catch_propagates_the_ok_value() {
    assert_eq!(run("let r = (6 / 2) or e { -1 }; exit(r);"), 3);
}

#[test]
fn defers_in_a_block_run_in_reverse_registration_order() {
    // d1, d2, d3 registered in that order; spec.md says they run d3, d2, d1
    // on exit. Each defer writes its own label into the next free slot of
    // `order` (postfix `next++` reads the current slot then advances it),
    // so the slot contents encode the order they actually ran in.
    assert_eq!(
        run(
            "let order = [0, 0, 0];
             let next = 0;
             {
                 defer order[next++] = 1;
                 defer order[next++] = 2;
                 defer order[next++] = 3;
             }
             exit(order[0] * 100 + order[1] * 10 + order[2]);"
        ),
        321
    );
}

#[test]
fn defer_runs_before_the_caller_observes_the_return() {
    assert_eq!(
        run(
            "let order = [0, 0];
             fn f() {
                 defer order[1] = 2;
                 order[0] = 1;
                 return 42;
             }
             let r = f();
             exit(r + order[0] * 10 + order[1]);"
        ),
        54
    );
}

#[test]
fn uncaught_runtime_failure_exits_nonzero() {
    assert_eq!(run("let x = 1 / 0;"), 1);
}

#[test]
fn struct_literal_constructs_and_reads_back_attributes() {
    assert_eq!(
        run(
            "let Point = struct('Point', ['x', 'y'], {'y': 0});
             let p = Point{x = 3, y = 4};
             exit(p.x + p.y);"
        ),
        7
    );
}

#[test]
fn struct_literal_falls_back_to_declared_default() {
    assert_eq!(
        run(
            "let Point = struct('Point', ['x', 'y'], {'y': 9});
             let p = Point{x = 1};
             exit(p.x + p.y);"
        ),
        10
    );
}
