//! Required-ness transitive closure (spec §4.F).
//!
//! A definition is required if the environment directly needs it (the module
//! entry point, anything `environment_required`) or if some other required
//! definition references it. This is recomputed as a closure rather than a single
//! DFS because macros can introduce brand-new definitions between passes — a
//! reference recorded before its referent existed still needs to propagate once
//! the referent shows up.

use crate::environment::EvaluatorEnvironment;
use crate::error::{Diagnostic, EvalErrorKind, EvalResult};
use crate::references::GuessState;
use crate::token::TokenRef;

/// Runs the propagation to a fixpoint, marking every definition reachable from an
/// already-required one. Returns whether any definition's `is_required` flag made
/// the `false -> true` transition during this call, so the outer control loop can
/// tell whether this pass did anything.
pub fn propagate_required(env: &mut EvaluatorEnvironment) -> bool {
    let mut any_change = false;
    loop {
        // Copy owned names before mutating `env.definitions` through the loop body,
        // per the "copy handles, then re-look-up" discipline (spec §9) — a
        // reference's target definition may not have existed when we started
        // iterating.
        let required_names: Vec<String> = env.definitions.iter().filter(|(_, def)| def.is_required).map(|(name, _)| name.clone()).collect();

        let mut referenced_this_round: Vec<String> = Vec::new();
        for name in &required_names {
            let def = &env.definitions[name];
            for referenced_name in def.references.keys() {
                referenced_this_round.push(referenced_name.clone());
            }
        }

        let mut changed_this_pass = false;
        for referenced_name in referenced_this_round {
            if let Some(def) = env.definitions.get_mut(&referenced_name) {
                if def.mark_required() {
                    changed_this_pass = true;
                }
            }
            // A referenced name with no definition yet is simply not required yet;
            // it will be picked up once its definition is inserted and this pass
            // re-runs.
        }

        if changed_this_pass {
            any_change = true;
        } else {
            break;
        }
    }
    any_change
}

/// The top-level control loop's `finalCheck()` (spec's top-level control loop):
/// once the fixpoint has settled, every required reference must have either
/// resolved to something concrete or still be a plain externally-linked guess — a
/// reference left in guess state `None`, or waiting on a compile-time object that
/// never finished loading, means the name was never defined anywhere reachable.
pub fn final_check(env: &EvaluatorEnvironment) -> EvalResult<()> {
    let required_names: Vec<&String> = env.definitions.iter().filter(|(_, def)| def.is_required).map(|(name, _)| name).collect();

    for owner in required_names {
        let def = &env.definitions[owner];
        for (name, status) in &def.references {
            let unresolved = match status.guess_state.state {
                GuessState::None => true,
                GuessState::WaitingForLoad => !env.definitions.get(name).is_some_and(|referent| referent.is_loaded),
                GuessState::Guessed | GuessState::Resolved => false,
            };
            if !unresolved {
                continue;
            }
            let blame = status
                .pool_indices
                .first()
                .and_then(|&idx| env.reference_pool(name).and_then(|pool| pool.references.get(idx)))
                .map(|r| env.tokens.token(TokenRef { vec: r.token_vec, index: r.start_index }).blame());
            return Err(Diagnostic {
                blame: blame.unwrap_or(crate::error::Blame { file: String::new(), line: 0, column_start: 0 }),
                kind: EvalErrorKind::UnresolvedReference { name: name.clone() },
                note: None,
            });
        }
    }
    Ok(())
}
