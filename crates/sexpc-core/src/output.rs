//! Sequence of string-output ops with embedded splice handles (spec §3, §4.B).
//!
//! An [`Output`] is what a generator writes into: two independent op streams,
//! `source` and `header`, because a single Cakelisp-dialect definition can
//! contribute to both the `.c`/`.cpp` file and its paired `.h` file (e.g. a function
//! definition emits its body to source and its prototype to header).

use bitflags::bitflags;

use crate::error::{Blame, Diagnostic, EvalErrorKind, EvalResult};
use crate::token::TokenRef;

bitflags! {
    /// Formatting/semantic hints the writer (external, §6) consults when rendering
    /// an [`OutputOp`] to text. Mirrors the original's `StringOutputModifierFlags`
    /// bit layout one-for-one, just expressed with `bitflags!` instead of a C enum.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Modifiers: u32 {
        const NEWLINE_AFTER          = 1 << 0;
        const SPACE_AFTER            = 1 << 1;
        const SPACE_BEFORE           = 1 << 2;
        const SURROUND_WITH_QUOTES   = 1 << 3;
        const CONVERT_TYPE_NAME      = 1 << 4;
        const CONVERT_FUNCTION_NAME  = 1 << 5;
        const CONVERT_ARGUMENT_NAME  = 1 << 6;
        const CONVERT_VARIABLE_NAME  = 1 << 7;
        const CONVERT_GLOBAL_NAME    = 1 << 8;
        const OPEN_PAREN             = 1 << 9;
        const CLOSE_PAREN            = 1 << 10;
        const OPEN_BLOCK             = 1 << 11;
        const CLOSE_BLOCK            = 1 << 12;
        const OPEN_LIST              = 1 << 13;
        const CLOSE_LIST             = 1 << 14;
        const END_STATEMENT          = 1 << 15;
        const LIST_SEPARATOR         = 1 << 16;
    }
}

impl Modifiers {
    /// A modifier set carries "convert this as a name" only if one of the four
    /// name-kind bits is set.
    pub fn name_conversion_kind(self) -> Option<NameKind> {
        if self.contains(Self::CONVERT_TYPE_NAME) {
            Some(NameKind::Type)
        } else if self.contains(Self::CONVERT_FUNCTION_NAME) {
            Some(NameKind::Function)
        } else if self.contains(Self::CONVERT_ARGUMENT_NAME) {
            Some(NameKind::Argument)
        } else if self.contains(Self::CONVERT_VARIABLE_NAME) {
            Some(NameKind::Variable)
        } else if self.contains(Self::CONVERT_GLOBAL_NAME) {
            Some(NameKind::Global)
        } else {
            None
        }
    }
}

/// Which name-style conversion a `Convert*Name` modifier requests. The actual
/// casing rules live in the driver's writer; the core only needs to tag which kind
/// applies to a given literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameKind {
    Type,
    Function,
    Argument,
    Variable,
    Global,
}

/// A stable handle into the environment's output arena. Splices carry this instead
/// of a borrowed or raw pointer to the referent `Output`, so many enclosing outputs
/// (and the reference pool) can point at the same splice target safely. See spec §9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputId(u32);

impl OutputId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index.try_into().expect("output arena overflowed u32"))
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// One unit in a generator's output stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputOp {
    /// Literal text, e.g. a function name, an operator, a string constant.
    Literal { text: String, modifiers: Modifiers, blame: Option<TokenRef> },
    /// A formatting marker with no text of its own (an open-brace, a delimiter, a
    /// bare newline).
    LangMarker { modifiers: Modifiers, blame: Option<TokenRef> },
    /// A placeholder: at final-write time, replaced in place by the full contents of
    /// the pointed-to `Output`.
    Splice(OutputId),
}

impl OutputOp {
    pub fn literal(text: impl Into<String>, modifiers: Modifiers) -> Self {
        Self::Literal { text: text.into(), modifiers, blame: None }
    }

    pub fn marker(modifiers: Modifiers) -> Self {
        Self::LangMarker { modifiers, blame: None }
    }

    /// Whitespace-only modifiers never make an op "meaningful" by themselves.
    const WHITESPACE_ONLY: Modifiers = Modifiers::NEWLINE_AFTER.union(Modifiers::SPACE_AFTER).union(Modifiers::SPACE_BEFORE);

    fn is_pure_formatting(&self) -> bool {
        match self {
            Self::Literal { text, modifiers, .. } => text.is_empty() && Self::WHITESPACE_ONLY.contains(*modifiers),
            Self::LangMarker { modifiers, .. } => Self::WHITESPACE_ONLY.contains(*modifiers),
            Self::Splice(_) => false,
        }
    }
}

/// Two independent op streams: one destined for the `.c`/`.cpp` file, one for the
/// paired header. A splice is written into *both* streams of the enclosing output so
/// a referent that emits to either preserves ordering (spec §4.B).
#[derive(Debug, Default, Clone)]
pub struct Output {
    pub source: Vec<OutputOp>,
    pub header: Vec<OutputOp>,
}

impl Output {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears both streams but leaves the `Output` itself alive, so existing splices
    /// that point at it remain valid handles (just pointing at emptiness until
    /// re-evaluated).
    pub fn reset(&mut self) {
        self.source.clear();
        self.header.clear();
    }

    /// Appends a splice sentinel to both streams, pointing at `target`.
    pub fn push_splice(&mut self, target: OutputId) {
        self.source.push(OutputOp::Splice(target));
        self.header.push(OutputOp::Splice(target));
    }
}

/// Owns every [`Output`] ever allocated: one per definition, plus one per splice
/// target created for a not-yet-resolved reference. Append-only, same reasoning as
/// [`crate::token::TokenArena`] — an [`OutputId`] must stay valid for the life of the
/// build even as new outputs are allocated mid-evaluation.
#[derive(Debug, Default)]
pub struct OutputArena {
    outputs: Vec<Output>,
}

impl OutputArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh, empty `Output` and returns its handle.
    pub fn new_output(&mut self) -> OutputId {
        let id = OutputId::new(self.outputs.len());
        self.outputs.push(Output::new());
        id
    }

    pub fn get(&self, id: OutputId) -> &Output {
        &self.outputs[id.index()]
    }

    pub fn get_mut(&mut self, id: OutputId) -> &mut Output {
        &mut self.outputs[id.index()]
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

/// Bound on splice nesting depth when flattening, so a (should-be-impossible) splice
/// cycle fails loudly instead of blowing the stack.
const MAX_SPLICE_DEPTH: usize = 1 << 14;

/// Recursively inlines every [`OutputOp::Splice`] reachable from `root`'s `source`
/// and `header` streams, producing a single fully-expanded [`Output`] with no splices
/// left in it. This is what a [`crate::interfaces::Writer`] is expected to receive:
/// by the time rendering happens every reference has been resolved, so every splice
/// target in the arena holds its final content.
pub fn flatten(arena: &OutputArena, root: OutputId) -> EvalResult<Output> {
    fn flatten_stream(arena: &OutputArena, ops: &[OutputOp], pick: fn(&Output) -> &[OutputOp], depth: usize, out: &mut Vec<OutputOp>) -> EvalResult<()> {
        if depth > MAX_SPLICE_DEPTH {
            return Err(Diagnostic {
                blame: Blame { file: String::new(), line: 0, column_start: 0 },
                kind: EvalErrorKind::InternalInvariantFailure("splice nesting exceeded depth limit (cycle?)".to_string()),
                note: None,
            });
        }
        for op in ops {
            match op {
                OutputOp::Splice(id) => flatten_stream(arena, pick(arena.get(*id)), pick, depth + 1, out)?,
                other => out.push(other.clone()),
            }
        }
        Ok(())
    }

    let root_output = arena.get(root);
    let mut flattened = Output::new();
    flatten_stream(arena, &root_output.source, |o| &o.source, 0, &mut flattened.source)?;
    flatten_stream(arena, &root_output.header, |o| &o.header, 0, &mut flattened.header)?;
    Ok(flattened)
}

/// "Meaningful output" = any op other than a pure formatting marker (an empty
/// literal, or a newline/space-only marker) or an empty splice target. Delimiter
/// insertion in [`crate::evaluator`] uses this to decide whether a sibling produced
/// anything worth separating.
pub fn has_meaningful_output(ops: &[OutputOp], resolve_empty_splice: impl Fn(OutputId) -> bool) -> bool {
    ops.iter().any(|op| match op {
        OutputOp::Splice(id) => !resolve_empty_splice(*id),
        other => !other.is_pure_formatting(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pure_formatting_markers_are_not_meaningful() {
        let ops = vec![OutputOp::marker(Modifiers::NEWLINE_AFTER), OutputOp::literal("", Modifiers::empty())];
        assert!(!has_meaningful_output(&ops, |_| true));
    }

    #[test]
    fn literal_text_is_meaningful() {
        let ops = vec![OutputOp::literal("x", Modifiers::empty())];
        assert!(has_meaningful_output(&ops, |_| true));
    }

    #[test]
    fn splice_is_meaningful_only_if_nonempty() {
        let id = OutputId::new(0);
        let ops = vec![OutputOp::Splice(id)];
        assert!(!has_meaningful_output(&ops, |_| true));
        assert!(has_meaningful_output(&ops, |_| false));
    }

    #[test]
    fn reset_keeps_output_alive_for_existing_splices() {
        let mut out = Output::new();
        out.source.push(OutputOp::literal("x", Modifiers::empty()));
        out.reset();
        assert!(out.source.is_empty());
        assert!(out.header.is_empty());
    }

    #[test]
    fn flatten_inlines_a_nested_splice() {
        let mut arena = OutputArena::new();
        let root = arena.new_output();
        let referent = arena.new_output();
        arena.get_mut(referent).source.push(OutputOp::literal("greet", Modifiers::CONVERT_FUNCTION_NAME));
        arena.get_mut(root).source.push(OutputOp::literal("(", Modifiers::empty()));
        arena.get_mut(root).push_splice(referent);
        arena.get_mut(root).source.push(OutputOp::literal(")", Modifiers::empty()));

        let flattened = flatten(&arena, root).unwrap();
        assert_eq!(
            flattened.source,
            vec![
                OutputOp::literal("(", Modifiers::empty()),
                OutputOp::literal("greet", Modifiers::CONVERT_FUNCTION_NAME),
                OutputOp::literal(")", Modifiers::empty()),
            ]
        );
    }

    #[test]
    fn flatten_leaves_an_empty_splice_target_empty() {
        let mut arena = OutputArena::new();
        let root = arena.new_output();
        let referent = arena.new_output();
        arena.get_mut(root).push_splice(referent);

        let flattened = flatten(&arena, root).unwrap();
        assert!(flattened.source.is_empty());
    }
}
