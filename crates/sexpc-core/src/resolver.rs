//! Reference resolution (spec §4.H): once a name's meaning becomes known, revisit
//! every call site that guessed at it and give it the real answer.

use crate::context::Invocation;
use crate::dispatch::{DispatchTable, DispatchTarget};
use crate::environment::EvaluatorEnvironment;
use crate::error::{Diagnostic, EvalErrorKind, EvalResult};
use crate::evaluator::Evaluator;
use crate::references::{GuessState, ReferenceResolutionKind};

/// Above this many recorded call sites for a single name, something is almost
/// certainly generating references in a loop rather than legitimately calling the
/// same name that many times.
const MAX_REFERENCES_PER_NAME: usize = 1 << 13;

/// Re-evaluates every `Splice`-kind, not-yet-resolved reference to `name`, now that
/// its real meaning is known. Returns the number of references resolved in this
/// call.
///
/// Re-looks-up the pool's reference list by index after each re-evaluation, since
/// evaluating a splice can itself record new references (including, in principle,
/// more references to `name`) that grow the very `Vec` being iterated.
pub fn resolve_references(env: &mut EvaluatorEnvironment, dispatch: &DispatchTable, name: &str) -> EvalResult<usize> {
    let mut resolved_count = 0usize;
    let mut cursor = 0usize;

    loop {
        let pool_len = match env.reference_pool(name) {
            Some(pool) => pool.references.len(),
            None => break,
        };
        if cursor >= pool_len {
            break;
        }
        if cursor >= MAX_REFERENCES_PER_NAME {
            let pool = env.reference_pool(name).expect("checked above");
            let sites: Vec<String> = pool.references[..10.min(pool_len)]
                .iter()
                .map(|r| env.tokens.token(crate::token::TokenRef { vec: r.token_vec, index: r.start_index }).blame().to_string())
                .collect();
            let first_blame = env.tokens.token(crate::token::TokenRef { vec: pool.references[0].token_vec, index: pool.references[0].start_index }).blame();
            return Err(Diagnostic {
                blame: first_blame,
                kind: EvalErrorKind::InternalInvariantFailure(format!("infinite loop? '{name}' has over {MAX_REFERENCES_PER_NAME} references; first sites: {}", sites.join(", "))),
                note: None,
            });
        }

        let (already_resolved, kind, token_vec, start_index, splice, context) = {
            let pool = env.reference_pool(name).expect("checked above");
            let r = &pool.references[cursor];
            (r.is_resolved, r.kind, r.token_vec, r.start_index, r.splice, r.context.clone())
        };

        if already_resolved || kind != ReferenceResolutionKind::Splice {
            cursor += 1;
            continue;
        }

        let splice_output = splice.expect("Splice-kind reference always carries a splice target");
        env.outputs.get_mut(splice_output).reset();

        let mut resolving_context = context;
        resolving_context.resolving_reference = Some(name.to_string());

        {
            let mut evaluator = Evaluator::new(env, dispatch);
            let invocation = Invocation { token: crate::token::TokenRef { vec: token_vec, index: start_index } };
            reevaluate_invocation(&mut evaluator, invocation, splice_output, &resolving_context)?;
        }

        if let Some(pool) = env.reference_pools.get_mut(name) {
            pool.references[cursor].is_resolved = true;
        }

        // The owner's guess now reflects `name`'s real meaning rather than an
        // optimistic external-call guess, once dispatch actually finds it somewhere.
        let owner = resolving_context.owning_definition().to_string();
        if !matches!(dispatch.dispatch(name, &env.definitions), DispatchTarget::Unknown) {
            if let Some(status) = env.definitions.get_mut(&owner).and_then(|def| def.references.get_mut(name)) {
                status.guess_state.set(GuessState::Resolved);
            }
        }

        resolved_count += 1;
        cursor += 1;
    }

    Ok(resolved_count)
}

fn reevaluate_invocation(evaluator: &mut Evaluator, invocation: Invocation, output: crate::output::OutputId, context: &crate::context::EvaluatorContext) -> EvalResult<()> {
    evaluator.evaluate_one(invocation.token.vec, invocation.token.index, output, context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins;
    use crate::context::{EvaluatorContext, ModuleId};
    use crate::token::{Token, TokenType};
    use std::rc::Rc;

    fn tok(kind: TokenType, text: &str) -> Token {
        Token::new(kind, text, Rc::from("test.sexp"), 1, 0, text.len() as u32)
    }

    #[test]
    fn unresolved_reference_pool_starts_empty() {
        let mut env = EvaluatorEnvironment::new();
        let dispatch = DispatchTable::new();
        let resolved = resolve_references(&mut env, &dispatch, "doesnt-exist").unwrap();
        assert_eq!(resolved, 0);
    }

    #[test]
    fn a_guessed_reference_can_be_resolved_once_recorded() {
        let mut env = EvaluatorEnvironment::new();
        let mut dispatch = DispatchTable::new();
        builtins::register(&mut dispatch);

        // (defun main () (greet))
        let tokens = vec![
            tok(TokenType::OpenParen, "("),
            tok(TokenType::Symbol, "defun"),
            tok(TokenType::Symbol, "main"),
            tok(TokenType::OpenParen, "("),
            tok(TokenType::CloseParen, ")"),
            tok(TokenType::OpenParen, "("),
            tok(TokenType::Symbol, "greet"),
            tok(TokenType::CloseParen, ")"),
            tok(TokenType::CloseParen, ")"),
        ];
        let vec_id = env.tokens.push(tokens);
        let context = EvaluatorContext::module_top_level(ModuleId(0));
        let output = env.outputs.new_output();
        let len = env.tokens.get(vec_id).len();
        {
            let mut evaluator = Evaluator::new(&mut env, &dispatch);
            evaluator.evaluate_all(vec_id, 0, len, output, &context).unwrap();
        }

        assert!(env.reference_pool("greet").is_some());
        assert_eq!(env.reference_pool("greet").unwrap().references.len(), 1);

        let resolved = resolve_references(&mut env, &dispatch, "greet").unwrap();
        assert_eq!(resolved, 1);
        assert!(env.reference_pool("greet").unwrap().references[0].is_resolved);
    }
}
