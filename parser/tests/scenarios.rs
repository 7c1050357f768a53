//! Parses, links and runs Structured Text programs from source.

mod common;

use common::{codes, query, resource, started, try_link, unit};
use stplc_dsl::core::Id;
use stplc_problems::Problem;
use stplc_runtime::{interpreter::StepOutcome, options::Options};

#[test]
fn run_cycle_when_for_loop_doubles_then_query_shows_eight() {
    let mut interpreter = started(vec![resource("doubling.st")], "P");
    interpreter.run_cycle().unwrap();
    assert_eq!(query(&mut interpreter, "P.x"), "8");
}

#[test]
fn run_cycle_when_for_loop_then_trip_count_fixed_and_control_written_once() {
    let source = "PROGRAM P
        VAR k : INT; n : INT; a : ARRAY[1..4] OF INT; END_VAR
        FOR k := 4 TO 1 BY -1 DO
            a[k] := a[k] + 1;
            n := n + 1;
        END_FOR;
        END_PROGRAM";
    let mut interpreter = started(vec![unit("for.st", source)], "P");
    interpreter.run_cycle().unwrap();
    assert_eq!(query(&mut interpreter, "P.n"), "4");
    assert_eq!(query(&mut interpreter, "P.k"), "4");
    assert_eq!(query(&mut interpreter, "P.a[4]"), "4");
    assert_eq!(query(&mut interpreter, "P.a[1]"), "0");
}

#[test]
fn link_when_block_comments_then_ignored() {
    let source = "(* A program. *)
        PROGRAM P (* name(s) * and more *)
        VAR x : INT; END_VAR
        (* first line
           second line *)
        x := 2 (* inline *) + 1;
        END_PROGRAM";
    let mut interpreter = started(vec![unit("comments.st", source)], "P");
    interpreter.run_cycle().unwrap();
    assert_eq!(query(&mut interpreter, "P.x"), "3");
}

#[test]
fn start_when_struct_initializer_then_displays_members() {
    let mut interpreter = started(vec![resource("structs.st")], "P");
    assert_eq!(query(&mut interpreter, "P.s"), "(a:5,b:true)");
}

#[test]
fn link_when_struct_initializer_missing_member_then_names_member() {
    let source = "TYPE S : STRUCT a : INT; b : BOOL; END_STRUCT; END_TYPE
        PROGRAM P VAR s : S := (a := 5); END_VAR END_PROGRAM";
    let diagnostics = try_link(vec![unit("missing.st", source)], Options::default()).err().unwrap();
    assert_eq!(codes(&diagnostics), vec![Problem::MissingMember.code()]);
    assert!(diagnostics[0].description().contains("member=b"));
}

#[test]
fn link_when_two_units_declare_same_type_then_duplicate_declaration() {
    let first = unit("first.st", "TYPE T : INT; END_TYPE");
    let second = unit("second.st", "TYPE T : BOOL; END_TYPE PROGRAM P END_PROGRAM");
    let diagnostics = try_link(vec![first, second], Options::default()).err().unwrap();
    assert_eq!(codes(&diagnostics), vec![Problem::DuplicateDeclaration.code()]);
    assert!(!diagnostics[0].secondary.is_empty());
}

#[test]
fn link_when_relinked_then_same_problems() {
    let source = "PROGRAM P VAR x : Missing; END_VAR y := 1; END_PROGRAM";
    let first = try_link(vec![unit("p.st", source)], Options::default()).err().unwrap();
    let second = try_link(vec![unit("p.st", source)], Options::default()).err().unwrap();
    assert_eq!(codes(&first), codes(&second));
    assert_eq!(
        first.iter().map(|d| d.primary.span.start).collect::<Vec<_>>(),
        second.iter().map(|d| d.primary.span.start).collect::<Vec<_>>()
    );
}

#[test]
fn link_when_invalid_token_then_parse_errors_present() {
    let source = "PROGRAM P VAR x : INT; END_VAR x := 1; ? END_PROGRAM";
    let diagnostics = try_link(vec![unit("p.st", source)], Options::default()).err().unwrap();
    assert_eq!(
        codes(&diagnostics),
        vec![Problem::UnexpectedToken.code(), Problem::ParseErrorsPresent.code()]
    );
}

#[test]
fn link_when_invalid_token_and_resolve_on_parse_error_then_runs() {
    let source = "PROGRAM P VAR x : INT; END_VAR x := 1; ? END_PROGRAM";
    let options = Options::default().with_resolve_links_on_parse_error(true);
    let mut interpreter = try_link(vec![unit("p.st", source)], options).unwrap();
    interpreter.start(&Id::from("P")).unwrap();
    interpreter.run_cycle().unwrap();
    assert_eq!(query(&mut interpreter, "P.x"), "1");
}

#[test]
fn run_cycle_when_types_then_values_follow_declarations() {
    let mut interpreter = started(vec![resource("types.st")], "Main");
    assert_eq!(query(&mut interpreter, "Main.color"), "Blue");
    assert_eq!(query(&mut interpreter, "Main.grid[2, 1]"), "false");
    interpreter.run_cycle().unwrap();
    assert_eq!(query(&mut interpreter, "Main.percent"), "55");
    assert_eq!(query(&mut interpreter, "Main.grid[2, 1]"), "true");
}

#[test]
fn run_cycle_when_each_statement_kind_then_expected_values() {
    let mut interpreter = started(vec![resource("statements.st")], "Main");
    interpreter.run_cycle().unwrap();
    assert_eq!(query(&mut interpreter, "Main.sum"), "6");
    assert_eq!(query(&mut interpreter, "Main.i"), "9");
    assert_eq!(query(&mut interpreter, "Main.k"), "1");
    assert_eq!(query(&mut interpreter, "Main.label"), "'few'");
    assert_eq!(query(&mut interpreter, "Main.mode"), "0");
    assert_eq!(query(&mut interpreter, "Main.done"), "true");
}

#[test]
fn run_cycle_when_function_block_and_function_then_state_kept_between_cycles() {
    let mut interpreter = started(vec![resource("counter.st")], "Main");
    interpreter.run_cycle().unwrap();
    assert_eq!(query(&mut interpreter, "Main.doubled"), "6");
    interpreter.run_cycle().unwrap();
    assert_eq!(query(&mut interpreter, "Main.c"), "(inc:3,total:6)");
    assert_eq!(query(&mut interpreter, "Main.doubled"), "12");
}

#[test]
fn run_cycle_when_external_then_reads_and_writes_global() {
    let mut interpreter = started(vec![resource("globals.st")], "P");
    interpreter.run_cycle().unwrap();
    assert_eq!(query(&mut interpreter, "P.copy"), "7");
    assert_eq!(query(&mut interpreter, "shared"), "8");
}

#[test]
fn run_cycle_when_division_by_zero_then_fails_and_recovers_after_query() {
    let mut interpreter = started(vec![resource("division.st")], "P");
    let diagnostic = interpreter.run_cycle().unwrap_err();
    assert_eq!(diagnostic.code(), Problem::DivisionByZero.code());
    assert!(!interpreter.is_fatal());
    assert_eq!(query(&mut interpreter, "P.x"), "10");

    assert_eq!(query(&mut interpreter, "P.d := 2"), "2");
    interpreter.run_cycle().unwrap();
    assert_eq!(query(&mut interpreter, "P.y"), "5");
}

#[test]
fn run_cycle_when_direct_outputs_then_memory_has_values() {
    let mut interpreter = started(vec![resource("outputs.st")], "P");
    interpreter.run_cycle().unwrap();
    let outputs = interpreter.memory().area(stplc_runtime::memory::Area::Output);
    assert_eq!(outputs[0], 0b10);
    assert_eq!(outputs[1], 42);
}

#[test]
fn step_when_counter_then_pauses_at_each_statement_of_main() {
    let source = read_counter();
    let mut interpreter = started(vec![unit("counter.st", &source)], "Main");

    let StepOutcome::Paused(first) = interpreter.step() else {
        panic!("expected pause at the call");
    };
    assert_eq!(&source[first.start..first.start + 1], "c");
    let StepOutcome::Paused(second) = interpreter.step() else {
        panic!("expected pause at the assignment");
    };
    assert_eq!(&source[second.start..second.start + 7], "doubled");
    assert!(matches!(interpreter.step(), StepOutcome::CycleComplete));
    assert_eq!(query(&mut interpreter, "Main.doubled"), "6");
}

#[test]
fn step_in_when_call_then_pauses_in_function_block() {
    let source = read_counter();
    let mut interpreter = started(vec![unit("counter.st", &source)], "Main");

    assert!(matches!(interpreter.step(), StepOutcome::Paused(_)));
    let StepOutcome::Paused(inside) = interpreter.step_in() else {
        panic!("expected pause inside Counter");
    };
    assert_eq!(&source[inside.start..inside.start + 5], "total");
    let StepOutcome::Paused(back) = interpreter.step_out() else {
        panic!("expected pause after return");
    };
    assert_eq!(&source[back.start..back.start + 7], "doubled");
}

#[test]
fn query_when_user_function_then_not_constant() {
    let mut interpreter = started(vec![resource("counter.st")], "Main");
    let parsed = stplc_parser::parse_query("Twice(value := 2)").unwrap();
    let diagnostics = interpreter.query(parsed).unwrap_err();
    assert_eq!(codes(&diagnostics), vec![Problem::NotConstant.code()]);
}

#[test]
fn query_when_standard_function_then_value() {
    let mut interpreter = started(vec![resource("doubling.st")], "P");
    assert_eq!(query(&mut interpreter, "MAX(3, P.x + 7)"), "7");
}

fn read_counter() -> String {
    stplc_test::read_shared_resource("counter.st")
}
