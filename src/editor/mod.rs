//! Editor collaborator: live text sessions addressable by stable identifier.
//!
//! Widget instantiation and display belong to the presentation layer; the
//! pipeline only ever asks an editor for its current text.

use std::{collections::HashMap, sync::Arc};

/// Suffix that names the driver editor belonging to a source editor.
pub const DRIVER_SUFFIX: &str = "_run";

pub trait Editor: Send + Sync {
    /// Current text of the editing session.
    fn value(&self) -> String;
}

/// In-memory editor backed by a fixed buffer.
#[derive(Debug, Clone)]
pub struct BufferEditor {
    text: String,
}

impl BufferEditor {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl Editor for BufferEditor {
    fn value(&self) -> String {
        self.text.clone()
    }
}

/// Editors live for the whole session; the registry hands out shared
/// handles and never destroys them.
#[derive(Default)]
pub struct EditorRegistry {
    editors: HashMap<String, Arc<dyn Editor>>,
}

impl EditorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, editor: Arc<dyn Editor>) {
        self.editors.insert(id.into(), editor);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Editor>> {
        self.editors.get(id).cloned()
    }

    /// Identifier of the driver editor paired with a source editor.
    pub fn driver_id(id: &str) -> String {
        format!("{id}{DRIVER_SUFFIX}")
    }
}

/// Normalize user-provided source: strip the shortest common indentation of
/// non-blank lines, trim surrounding blank space, end with one newline.
pub fn format_source(code: &str) -> String {
    let lines: Vec<&str> = code.lines().collect();
    let shortest = lines
        .iter()
        .filter(|line| !line.trim_end().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    // Leading indentation is ASCII whitespace, so byte slicing is safe;
    // blank lines may be shorter than the common indent.
    let dedented = lines
        .iter()
        .map(|line| line.get(shortest.min(line.len())..).unwrap_or(""))
        .collect::<Vec<_>>()
        .join("\n");

    let mut out = dedented.trim().to_string();
    out.push('\n');
    out
}
