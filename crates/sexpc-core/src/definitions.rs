//! `ObjectDefinition` and the definition table (spec §3, §4.C).

use bitflags::bitflags;
use indexmap::IndexMap;

use crate::context::EvaluatorContext;
use crate::output::OutputId;
use crate::references::ReferenceStatusMap;
use crate::token::TokenRef;

/// The name under which module-top-level references are recorded, when a context
/// has no enclosing definition of its own.
pub const GLOBAL_DEFINITION_NAME: &str = "<global>";

/// What kind of named thing a definition introduces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// The implicit module-top-level pseudo-object that owns references made
    /// directly at module scope.
    PseudoObject,
    Function,
    Variable,
    CompileTimeMacro,
    CompileTimeGenerator,
    CompileTimeFunction,
    /// A compile-time generator implemented by a pre-existing native library rather
    /// than Cakelisp-dialect source the build pipeline compiles itself.
    CompileTimeExternalGenerator,
}

impl ObjectKind {
    pub fn is_compile_time(self) -> bool {
        matches!(
            self,
            Self::CompileTimeMacro | Self::CompileTimeGenerator | Self::CompileTimeFunction | Self::CompileTimeExternalGenerator
        )
    }
}

bitflags! {
    /// Tracks whether a definition's emitted code needs C or C++ linkage/features,
    /// so the driver can decide `extern "C"` wrapping and which toolchain flags to
    /// pass.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RequiredFeatures: u32 {
        const C_LINKAGE = 1 << 0;
        const CPP_FEATURES = 1 << 1;
    }
}

/// One (invocation-token, produced-tokens) record of a macro expansion contributing
/// to a definition, kept so post-macro-expansion hooks can reconstruct what a
/// definition's expanded form actually was.
#[derive(Debug, Clone, Copy)]
pub struct MacroExpansion {
    pub at_token: TokenRef,
    pub produced_tokens: crate::token::TokenVecId,
}

/// A blame record for why a feature flag got set, so diagnostics can point at the
/// token that forced e.g. C++ linkage.
#[derive(Debug, Clone, Copy)]
pub struct RequiredFeatureReason {
    pub blame: TokenRef,
    pub features: RequiredFeatures,
}

/// A single named thing the evaluator has defined: a runtime function/variable, or a
/// compile-time macro/generator/function.
#[derive(Debug, Clone)]
pub struct ObjectDefinition {
    pub name: String,
    pub kind: ObjectKind,
    /// The generator invocation that actually triggered this definition. `None`
    /// only for the module-level pseudo-object, which is never itself invoked.
    pub definition_invocation: Option<TokenRef>,
    pub references: ReferenceStatusMap,
    pub macro_expansions: Vec<MacroExpansion>,
    /// Required-ness spreads from the top-level module scope (spec §4.F); this is
    /// the accumulated result, and only ever transitions `false -> true`.
    pub is_required: bool,
    /// The environment requires this definition (e.g. it backs a built-in hook)
    /// regardless of whether user code references it; suppresses "built but
    /// unreferenced" warnings.
    pub environment_required: bool,
    /// Set once a build attempt fails with zero missing/unresolved references,
    /// meaning the failure is a genuine compile error rather than a dependency gap.
    /// Prevents endless retries.
    pub forbid_build: bool,
    pub context: EvaluatorContext,
    /// Every definition's output tree. Runtime definitions use this so
    /// post-macro-expansion code modification can still reach their output;
    /// compile-time definitions use it to stay out of runtime output and to be
    /// rendered straight to the per-object cache files.
    pub output: OutputId,
    pub is_loaded: bool,
    pub compile_time_header_name: Option<String>,
    /// Only meaningful on import-library-using toolchains (Windows); the import
    /// library name needed by other compile-time code calling into this one.
    pub compile_time_import_library_name: Option<String>,
    pub tags: Vec<String>,
    /// Incremented for each gensym-style unique name requested within this
    /// definition's compile-time body.
    pub next_free_unique_symbol_num: u32,
    /// At evaluate time, `tokenize-push` stashes tokens here keyed by a per-push id;
    /// at macro run-time those same ids are used to splice the pushed tokens into
    /// the macro's output.
    pub tokenize_push_tokens: IndexMap<u32, TokenRef>,
    pub required_features: RequiredFeatures,
    pub required_features_reasons: Vec<RequiredFeatureReason>,
    /// Only meaningful for compile-time kinds; runtime Function/Variable
    /// definitions never leave `BuildStage::None`.
    pub build_stage: crate::pipeline::BuildStage,
}

impl ObjectDefinition {
    pub fn new(name: impl Into<String>, kind: ObjectKind, definition_invocation: Option<TokenRef>, context: EvaluatorContext, output: OutputId) -> Self {
        Self {
            name: name.into(),
            kind,
            definition_invocation,
            references: ReferenceStatusMap::new(),
            macro_expansions: Vec::new(),
            is_required: false,
            environment_required: false,
            forbid_build: false,
            context,
            output,
            is_loaded: false,
            compile_time_header_name: None,
            compile_time_import_library_name: None,
            tags: Vec::new(),
            next_free_unique_symbol_num: 0,
            tokenize_push_tokens: IndexMap::new(),
            required_features: RequiredFeatures::empty(),
            required_features_reasons: Vec::new(),
            build_stage: crate::pipeline::BuildStage::None,
        }
    }

    /// Marks this definition required. Returns whether this was a `false -> true`
    /// transition (so callers can detect progress without re-scanning).
    pub fn mark_required(&mut self) -> bool {
        if self.is_required {
            false
        } else {
            self.is_required = true;
            true
        }
    }

    pub fn next_unique_symbol(&mut self) -> u32 {
        let n = self.next_free_unique_symbol_num;
        self.next_free_unique_symbol_num += 1;
        n
    }
}

/// Definitions keyed by name, in insertion order. `IndexMap` rather than a hash map
/// so that diagnostics and the build pipeline's wave order are reproducible, and so
/// that the "copy handles before iterating" discipline (spec §9) has a natural,
/// order-stable `Vec<String>` to copy into.
pub type ObjectDefinitionMap = IndexMap<String, ObjectDefinition>;
