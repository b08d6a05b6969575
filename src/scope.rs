//! Internal grammar-state stack shared by the text-backed and tree-backed
//! reader and writer implementations

use std::fmt::Write;

/// Lexical scope of a reader or writer cursor
///
/// Every reader and writer implementation drives the same scope transitions,
/// which is what makes their grammar enforcement identical.
#[derive(PartialEq, Eq, Clone, Copy, Debug, strum::Display)]
pub(crate) enum Scope {
    /// No top-level value has been consumed or produced yet
    EmptyDocument,
    /// A top-level value has been consumed or produced
    NonemptyDocument,
    /// Inside a `[` with no element yet
    EmptyArray,
    /// Inside an array with at least one element
    NonemptyArray,
    /// Inside a `{` with no member yet
    EmptyObject,
    /// A member name has been consumed or produced, its value has not
    DanglingName,
    /// Inside an object with at least one complete member
    NonemptyObject,
    /// The document has been closed, no further operations are possible
    Closed,
}

/// Scope plus the path information for diagnostics
#[derive(Clone, Debug)]
pub(crate) struct ScopeFrame {
    pub(crate) scope: Scope,
    /// Name of the current member, for object frames
    pub(crate) path_name: Option<String>,
    /// Number of completed elements, for array frames
    pub(crate) path_index: u32,
}

impl ScopeFrame {
    fn new(scope: Scope) -> Self {
        ScopeFrame {
            scope,
            path_name: None,
            path_index: 0,
        }
    }
}

/// Single growable stack of [`ScopeFrame`]s
///
/// The stack is never empty; the bottom frame is always a document scope
/// (or `Closed` once the reader or writer has been closed).
#[derive(Clone, Debug)]
pub(crate) struct ScopeStack {
    frames: Vec<ScopeFrame>,
}

impl ScopeStack {
    pub(crate) fn new() -> Self {
        ScopeStack {
            frames: vec![ScopeFrame::new(Scope::EmptyDocument)],
        }
    }

    /// Number of frames, including the document frame
    pub(crate) fn len(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn push(&mut self, scope: Scope) {
        self.frames.push(ScopeFrame::new(scope));
    }

    pub(crate) fn pop(&mut self) -> ScopeFrame {
        match self.frames.pop() {
            Some(frame) => frame,
            // The bottom document frame is only removed by `close()`
            None => unreachable!("scope stack is empty"),
        }
    }

    pub(crate) fn top(&self) -> Scope {
        self.top_frame().scope
    }

    fn top_frame(&self) -> &ScopeFrame {
        match self.frames.last() {
            Some(frame) => frame,
            None => unreachable!("scope stack is empty"),
        }
    }

    fn top_frame_mut(&mut self) -> &mut ScopeFrame {
        match self.frames.last_mut() {
            Some(frame) => frame,
            None => unreachable!("scope stack is empty"),
        }
    }

    /// Replaces the scope of the top frame, keeping its path information
    pub(crate) fn replace_top(&mut self, scope: Scope) {
        self.top_frame_mut().scope = scope;
    }

    /// Records the name of the member which is currently being processed
    pub(crate) fn set_path_name(&mut self, name: &str) {
        let frame = self.top_frame_mut();
        match &mut frame.path_name {
            // Reuse the existing allocation where possible
            Some(existing) => {
                existing.clear();
                existing.push_str(name);
            }
            None => frame.path_name = Some(name.to_owned()),
        }
    }

    /// Increments the element index of the top frame; called when a value
    /// inside an array has been fully consumed or produced
    pub(crate) fn increment_path_index(&mut self) {
        self.top_frame_mut().path_index += 1;
    }

    /// Discards all frames and leaves a single `Closed` frame
    pub(crate) fn close(&mut self) {
        self.frames.clear();
        self.frames.push(ScopeFrame::new(Scope::Closed));
    }

    /// Renders the path to the current cursor position in dot and bracket
    /// notation, for example `$.a[2]`
    ///
    /// `$` is the root of the document, `.name` a member of an object and
    /// `[index]` an element of an array.
    pub(crate) fn format_path(&self) -> String {
        let mut path = String::from("$");
        for frame in &self.frames {
            match frame.scope {
                Scope::EmptyArray | Scope::NonemptyArray => {
                    // Error can be ignored, writing to a String always succeeds
                    let _ = write!(path, "[{}]", frame.path_index);
                }
                Scope::EmptyObject | Scope::DanglingName | Scope::NonemptyObject => {
                    path.push('.');
                    if let Some(name) = &frame.path_name {
                        path.push_str(name);
                    }
                }
                Scope::EmptyDocument | Scope::NonemptyDocument | Scope::Closed => {}
            }
        }
        path
    }
}
