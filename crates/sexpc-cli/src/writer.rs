//! Renders a flattened [`Output`] to `.c`/`.h` text (spec AMBIENT STACK's `Writer`),
//! applying per-[`NameKind`] name-style conversion on top of the plain literal text
//! each [`OutputOp::Literal`] already carries.
//!
//! Splices must already be resolved by the time an [`Output`] reaches here —
//! `sexpc_core::flatten` is what the driver calls first; this module only turns op
//! streams into text.

use heck::{ToShoutySnakeCase, ToSnakeCase, ToUpperCamelCase};

use sexpc_core::{EvalResult, Modifiers, NameKind, Output, OutputOp, RenderedOutput, Writer as WriterTrait};

/// Which casing each [`NameKind`] is rendered with. Defaults match the original
/// implementation's C-style conventions: types are `PascalCase`, everything else that
/// isn't a compile-time global is `snake_case`, and globals are shouted.
#[derive(Debug, Clone)]
pub struct NameStyleSettings {
    pub type_style: Case,
    pub function_style: Case,
    pub argument_style: Case,
    pub variable_style: Case,
    pub global_style: Case,
}

impl Default for NameStyleSettings {
    fn default() -> Self {
        Self {
            type_style: Case::UpperCamel,
            function_style: Case::Snake,
            argument_style: Case::Snake,
            variable_style: Case::Snake,
            global_style: Case::ShoutySnake,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Case {
    Snake,
    UpperCamel,
    ShoutySnake,
    /// Leave the text exactly as written; used when a caller wants the writer to
    /// behave as a no-op name converter (e.g. round-trip tests).
    Verbatim,
}

impl Case {
    fn apply(self, text: &str) -> String {
        match self {
            Self::Snake => text.to_snake_case(),
            Self::UpperCamel => text.to_upper_camel_case(),
            Self::ShoutySnake => text.to_shouty_snake_case(),
            Self::Verbatim => text.to_string(),
        }
    }
}

impl NameStyleSettings {
    fn style_for(&self, kind: NameKind) -> Case {
        match kind {
            NameKind::Type => self.type_style,
            NameKind::Function => self.function_style,
            NameKind::Argument => self.argument_style,
            NameKind::Variable => self.variable_style,
            NameKind::Global => self.global_style,
        }
    }
}

pub struct PrettyWriter {
    pub name_styles: NameStyleSettings,
}

impl PrettyWriter {
    pub fn new(name_styles: NameStyleSettings) -> Self {
        Self { name_styles }
    }
}

impl Default for PrettyWriter {
    fn default() -> Self {
        Self::new(NameStyleSettings::default())
    }
}

impl WriterTrait for PrettyWriter {
    fn render(&self, output: &Output) -> EvalResult<RenderedOutput> {
        Ok(RenderedOutput {
            source_text: self.render_stream(&output.source),
            header_text: self.render_stream(&output.header),
        })
    }
}

impl PrettyWriter {
    fn render_stream(&self, ops: &[OutputOp]) -> String {
        let mut text = String::new();
        for op in ops {
            match op {
                OutputOp::Literal { text: literal, modifiers, .. } => self.render_literal(&mut text, literal, *modifiers),
                OutputOp::LangMarker { modifiers, .. } => self.render_marker(&mut text, *modifiers),
                OutputOp::Splice(_) => {
                    // An unresolved splice reaching the writer is a caller error: render
                    // it as nothing rather than panicking, so a missing `flatten` call
                    // shows up as a hole in the output instead of a crash.
                }
            }
        }
        text
    }

    fn render_literal(&self, text: &mut String, literal: &str, modifiers: Modifiers) {
        if modifiers.contains(Modifiers::SPACE_BEFORE) {
            text.push(' ');
        }
        let rendered = match modifiers.name_conversion_kind() {
            Some(kind) => self.name_styles.style_for(kind).apply(literal),
            None => literal.to_string(),
        };
        if modifiers.contains(Modifiers::SURROUND_WITH_QUOTES) {
            text.push('"');
            text.push_str(&rendered.replace('"', "\\\""));
            text.push('"');
        } else {
            text.push_str(&rendered);
        }
        self.render_trailing(text, modifiers);
    }

    fn render_marker(&self, text: &mut String, modifiers: Modifiers) {
        if modifiers.contains(Modifiers::SPACE_BEFORE) {
            text.push(' ');
        }
        if modifiers.contains(Modifiers::OPEN_PAREN) {
            text.push('(');
        }
        if modifiers.contains(Modifiers::CLOSE_PAREN) {
            text.push(')');
        }
        if modifiers.contains(Modifiers::OPEN_BLOCK) {
            text.push('{');
        }
        if modifiers.contains(Modifiers::CLOSE_BLOCK) {
            text.push('}');
        }
        if modifiers.contains(Modifiers::OPEN_LIST) {
            text.push('(');
        }
        if modifiers.contains(Modifiers::CLOSE_LIST) {
            text.push(')');
        }
        if modifiers.contains(Modifiers::LIST_SEPARATOR) {
            text.push(',');
        }
        if modifiers.contains(Modifiers::END_STATEMENT) {
            text.push(';');
        }
        self.render_trailing(text, modifiers);
    }

    fn render_trailing(&self, text: &mut String, modifiers: Modifiers) {
        if modifiers.contains(Modifiers::SPACE_AFTER) {
            text.push(' ');
        }
        if modifiers.contains(Modifiers::NEWLINE_AFTER) {
            text.push('\n');
        }
    }
}
