//! Data App source parsing.
//!
//! Parsing is total: every call yields a [`ParsingResult`] holding the arena,
//! the root node when one could be built, and all syntax errors found.

mod error;
mod grammar;
mod lower;
mod syntax;

use std::path::Path;

use tracing::{debug, warn};

pub use error::SyntaxError;

use crate::types::{Ast, NodeId, NodeRef, Position};

use lower::Lowering;

const SNIPPET_FILE: &str = "<snippet>";

/// Outcome of parsing one source unit.
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct ParsingResult {
    pub ast: Ast,
    pub root: Option<NodeId>,
    pub errors: Vec<SyntaxError>,
}

impl ParsingResult {
    /// A root was built and no error was reported.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.root.is_some() && self.errors.is_empty()
    }

    #[must_use]
    pub fn root_ref(&self) -> Option<NodeRef<'_>> {
        self.root.and_then(|id| self.ast.node(id))
    }
}

/// Parse the Data App stored at `path`.
///
/// A file that cannot be read produces a result without root and a single
/// error at [`Position::unknown`].
pub fn parse_data_app_file(path: impl AsRef<Path>) -> ParsingResult {
    let path = path.as_ref();
    let file = path.display().to_string();
    match std::fs::read_to_string(path) {
        Ok(text) => parse_data_app(&file, &text),
        Err(e) => {
            warn!(file = %file, error = %e, "cannot read data app source");
            ParsingResult {
                ast: Ast::new(),
                root: None,
                errors: vec![SyntaxError::new(
                    format!("cannot read file: {e}"),
                    file,
                    Position::unknown(),
                )],
            }
        }
    }
}

/// Parse Data App source text; `file` names it in positions and errors.
pub fn parse_data_app(file: &str, text: &str) -> ParsingResult {
    let unit = grammar::parse_unit(text, grammar::data_app);
    let mut lowering = Lowering::new(file, text);
    let root = unit.root.as_ref().map(|app| lowering.data_app(app));
    for recovered in &unit.errors {
        lowering.recovered(recovered);
    }
    finish(file, lowering, root)
}

/// Parse a standalone `{ ... }` statement block.
pub fn parse_block(text: &str) -> ParsingResult {
    let unit = grammar::parse_unit(text, grammar::block);
    let mut lowering = Lowering::new(SNIPPET_FILE, text);
    let root = unit.root.as_ref().map(|block| lowering.block(block));
    for recovered in &unit.errors {
        lowering.recovered(recovered);
    }
    finish(SNIPPET_FILE, lowering, root)
}

fn finish(file: &str, lowering: Lowering<'_>, root: Option<NodeId>) -> ParsingResult {
    let (ast, errors) = lowering.finish();
    debug!(
        file,
        nodes = ast.len(),
        errors = errors.len(),
        "parsed source"
    );
    ParsingResult { ast, root, errors }
}
