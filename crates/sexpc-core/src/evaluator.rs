//! The recursive evaluator (spec §4.E): walks one token range, dispatches on its
//! head symbol, and appends [`OutputOp`]s to the current output.

use crate::context::{EvaluatorContext, Invocation};
use crate::dispatch::{DispatchTable, DispatchTarget};
use crate::environment::EvaluatorEnvironment;
use crate::error::{Diagnostic, EvalErrorKind, EvalResult};
use crate::output::{Modifiers, OutputId, OutputOp};
use crate::references::{GuessState, ObjectReference, ReferenceResolutionKind};
use crate::token::{TokenRef, TokenType, TokenVecId};

/// Ties the token arena, output arena, definition/reference tables, and dispatch
/// table together for the duration of one evaluation call. Distinct from
/// [`EvaluatorEnvironment`], which owns the data across the whole build; this is
/// just a convenient `&mut` bundle so evaluator functions don't take ten arguments.
pub struct Evaluator<'env> {
    pub env: &'env mut EvaluatorEnvironment,
    pub dispatch: &'env DispatchTable,
}

impl<'env> Evaluator<'env> {
    pub fn new(env: &'env mut EvaluatorEnvironment, dispatch: &'env DispatchTable) -> Self {
        Self { env, dispatch }
    }

    /// Evaluates every top-level form in `[start, end)` of `vec_id`, writing into
    /// `output`, inserting `context.delimiter_template` between successive forms that
    /// each produced meaningful output.
    pub fn evaluate_all(&mut self, vec_id: TokenVecId, start: usize, end: usize, output: OutputId, context: &EvaluatorContext) -> EvalResult<()> {
        let mut index = start;
        let mut wrote_previous = false;
        while index < end {
            let tokens = self.env.tokens.get(vec_id);
            let next_index = if tokens[index].is_open_paren() {
                crate::token::find_close_paren(tokens, index) + 1
            } else {
                index + 1
            };

            let before_len = self.env.outputs.get(output).source.len();
            self.evaluate_one(vec_id, index, output, context)?;
            let wrote_this = self.env.outputs.get(output).source.len() > before_len;

            if wrote_previous && wrote_this {
                if let Some(delim) = &context.delimiter_template {
                    self.env.outputs.get_mut(output).source.push(delim.clone());
                }
            }
            wrote_previous = wrote_previous || wrote_this;
            index = next_index;
        }
        Ok(())
    }

    /// Evaluates the single form starting at `index` (an open-paren invocation, a
    /// bare symbol, or a string literal) and appends its output.
    pub fn evaluate_one(&mut self, vec_id: TokenVecId, index: usize, output: OutputId, context: &EvaluatorContext) -> EvalResult<()> {
        let token = self.env.tokens.get(vec_id)[index].clone();
        match token.kind {
            TokenType::OpenParen => self.evaluate_invocation(vec_id, index, output, context),
            TokenType::Symbol => {
                self.emit_symbol(&token, output, context);
                Ok(())
            }
            TokenType::String => {
                self.env.outputs.get_mut(output).source.push(OutputOp::Literal {
                    text: token.text.clone(),
                    modifiers: Modifiers::SURROUND_WITH_QUOTES,
                    blame: Some(TokenRef { vec: vec_id, index }),
                });
                Ok(())
            }
            TokenType::CloseParen => Err(Diagnostic {
                blame: token.blame(),
                kind: EvalErrorKind::InternalInvariantFailure("evaluate_one called directly on a close-paren".to_string()),
                note: None,
            }),
        }
    }

    fn evaluate_invocation(&mut self, vec_id: TokenVecId, open_index: usize, output: OutputId, context: &EvaluatorContext) -> EvalResult<()> {
        let tokens = self.env.tokens.get(vec_id);
        let head_index = open_index + 1;
        if head_index >= tokens.len() || !tokens[head_index].is_symbol() {
            let blame = tokens[open_index].blame();
            return Err(Diagnostic { blame, kind: EvalErrorKind::InvocationError("invocation head must be a symbol".to_string()), note: None });
        }
        let head = tokens[head_index].clone();
        let invocation = Invocation { token: TokenRef { vec: vec_id, index: open_index } };

        match self.dispatch.dispatch(&head.text, &self.env.definitions) {
            DispatchTarget::Generator(f) => f(self, invocation, context),
            DispatchTarget::Macro(f) => {
                let produced = f(self, invocation, context)?;
                let produced_id = self.env.tokens.push(produced);
                let len = self.env.tokens.get(produced_id).len();
                self.evaluate_all(produced_id, 0, len, output, context)
            }
            DispatchTarget::CompileTimeFunction(_) | DispatchTarget::RuntimeDefinition => {
                self.emit_call_as_reference(&head, vec_id, open_index, output, context)
            }
            DispatchTarget::Unknown => self.emit_call_as_reference(&head, vec_id, open_index, output, context),
        }
    }

    /// A symbol that isn't a known generator/macro and isn't itself an invocation
    /// head: emitted as a bare identifier, converted per context, with the handful
    /// of literal special-cases the original source carves out.
    fn emit_symbol(&mut self, token: &crate::token::Token, output: OutputId, _context: &EvaluatorContext) {
        let is_null = token.text == "null";
        let text = if is_null { "nullptr".to_string() } else { token.text.clone() };
        let starts_with_digit = |s: &str| s.chars().next().is_some_and(|c| c.is_ascii_digit());
        let is_negative_number = token.text.starts_with('-') && token.text[1..].chars().next().is_some_and(|c| c.is_ascii_digit());
        let is_literal = is_null || starts_with_digit(&token.text) || is_negative_number;
        let modifiers = if is_literal { Modifiers::empty() } else { Modifiers::CONVERT_VARIABLE_NAME };
        self.env.outputs.get_mut(output).source.push(OutputOp::Literal { text, modifiers, blame: None });
    }

    /// A reference to a name with no (yet) known definition, or a known but possibly
    /// not-yet-loaded compile-time definition: records an [`ObjectReference`] under
    /// both the owning definition's table and the name's pool, and pushes a splice
    /// placeholder the resolver will fill in later (spec §4.C, §4.H).
    fn emit_call_as_reference(&mut self, head: &crate::token::Token, vec_id: TokenVecId, start_index: usize, output: OutputId, context: &EvaluatorContext) -> EvalResult<()> {
        if context.resolving_reference.as_deref() == Some(head.text.as_str()) {
            // Re-evaluating this exact reference: treat as already-loaded, no new
            // bookkeeping, so resolution doesn't recursively grow its own pool.
            self.env.outputs.get_mut(output).source.push(OutputOp::Literal {
                text: head.text.clone(),
                modifiers: Modifiers::CONVERT_FUNCTION_NAME,
                blame: Some(TokenRef { vec: vec_id, index: start_index }),
            });
            return Ok(());
        }

        let splice_target = self.env.outputs.new_output();
        self.env.outputs.get_mut(output).push_splice(splice_target);

        let reference = ObjectReference {
            token_vec: vec_id,
            start_index,
            context: context.clone(),
            kind: ReferenceResolutionKind::Splice,
            splice: Some(splice_target),
            is_resolved: false,
        };
        let pool_index = self.env.reference_pool_mut(&head.text).references.len();
        self.env.reference_pool_mut(&head.text).references.push(reference);

        let owner = context.owning_definition().to_string();
        let status = self.env.status_for(&owner, &head.text);
        status.pool_indices.push(pool_index);
        status.guess_state.set(GuessState::Guessed);

        // A guessed reference is optimistically emitted as a direct external call;
        // the resolver overwrites the splice target once the name's real meaning is
        // known.
        self.env.outputs.get_mut(splice_target).source.push(OutputOp::Literal {
            text: head.text.clone(),
            modifiers: Modifiers::CONVERT_FUNCTION_NAME,
            blame: Some(TokenRef { vec: vec_id, index: start_index }),
        });
        Ok(())
    }
}
