//! Single-stepping a cycle produces the same values as running it, including
//! when the cycle calls functions and function blocks.

mod common;

use common::{query, started, unit};
use proptest::prelude::*;
use stplc_runtime::interpreter::{Interpreter, StepOutcome};

/// Integer expressions whose value fits in a LINT. `Twice` is a user
/// function so evaluating it switches into the callee.
fn expression() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![
        (0i64..10).prop_map(|v| v.to_string()),
        Just("a".to_string()),
        Just("b".to_string()),
    ];
    leaf.prop_recursive(4, 16, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(l, r)| format!("({} + {})", l, r)),
            (inner.clone(), inner.clone()).prop_map(|(l, r)| format!("({} - {})", l, r)),
            (inner.clone(), inner.clone()).prop_map(|(l, r)| format!("({} * {})", l, r)),
            inner.clone().prop_map(|e| format!("-({})", e)),
            inner.clone().prop_map(|e| format!("MAX({}, 2)", e)),
            inner.prop_map(|e| format!("Twice(value := {})", e)),
        ]
    })
}

fn program(first: &str, second: &str, third: &str) -> String {
    format!(
        "FUNCTION Twice : LINT
         VAR_INPUT value : LINT; END_VAR
            Twice := value * 2;
         END_FUNCTION

         FUNCTION_BLOCK Acc
         VAR_INPUT inc : LINT; END_VAR
         VAR_OUTPUT total : LINT; END_VAR
            total := total + Twice(value := inc);
         END_FUNCTION_BLOCK

         PROGRAM P
         VAR a : LINT := 3; b : LINT := -2; x : LINT; y : LINT; z : LINT; acc : Acc; END_VAR
            x := {};
            IF x > 0 THEN y := {}; ELSE y := x; END_IF
            acc(inc := {});
            z := acc.total;
            a := a + 1;
         END_PROGRAM",
        first, second, third
    )
}

#[derive(Clone, Copy, Debug)]
enum Driver {
    Over,
    Into,
    IntoThenOut,
}

/// Steps one cycle to its end and returns the number of pauses.
fn step_cycle(interpreter: &mut Interpreter, driver: Driver) -> usize {
    let mut pauses = 0;
    loop {
        let outcome = match driver {
            Driver::Over => interpreter.step(),
            Driver::Into => interpreter.step_in(),
            Driver::IntoThenOut if pauses % 2 == 0 => interpreter.step_in(),
            Driver::IntoThenOut => interpreter.step_out(),
        };
        match outcome {
            StepOutcome::Paused(_) => pauses += 1,
            StepOutcome::CycleComplete => return pauses,
            StepOutcome::Failed(d) => panic!("cycle failed with {:?}: {}", driver, d),
        }
    }
}

proptest! {
    #[test]
    fn step_when_stepped_to_end_then_same_values_as_run_cycle(
        first in expression(),
        second in expression(),
        third in expression(),
    ) {
        let source = program(&first, &second, &third);
        let mut running = started(vec![unit("p.st", &source)], "P");
        let mut over = started(vec![unit("p.st", &source)], "P");
        let mut into = started(vec![unit("p.st", &source)], "P");
        let mut out = started(vec![unit("p.st", &source)], "P");

        for _ in 0..2 {
            running.run_cycle().unwrap();
            let over_pauses = step_cycle(&mut over, Driver::Over);
            let into_pauses = step_cycle(&mut into, Driver::Into);
            step_cycle(&mut out, Driver::IntoThenOut);

            // Stepping into the block pauses at least at its one statement.
            prop_assert!(over_pauses >= 4);
            prop_assert!(into_pauses > over_pauses);
            for name in ["P.x", "P.y", "P.z", "P.a", "P.acc"] {
                let expected = query(&mut running, name);
                prop_assert_eq!(&expected, &query(&mut over, name));
                prop_assert_eq!(&expected, &query(&mut into, name));
                prop_assert_eq!(&expected, &query(&mut out, name));
            }
        }
    }
}
