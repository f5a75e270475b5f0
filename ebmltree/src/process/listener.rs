use anyhow::Result;

use crate::structs::schema::NodeRef;
use crate::structs::tree::Value;

/// How the walker consumes one recognized element.
///
/// Cursor effect of each action, measured from just after the element header:
///
/// | action | bytes consumed by the walker | in tree |
/// |---|---|---|
/// | `ReadNext` | the body (decoded or walked) | yes |
/// | `IgnoreElement` | the body, skipped undecoded | no |
/// | `SkipSiblings` | everything up to the container end | no |
/// | `TerminateParsing` | nothing, the walk ends | no |
/// | `SkipElement` | nothing, the body is read next as siblings | no |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ReadNext,
    IgnoreElement,
    SkipSiblings,
    TerminateParsing,
    SkipElement,
}

/// Caller policy consulted by the walker.
pub trait Listener {
    /// Called once per recognized element, before its body is consumed.
    fn decide(&mut self, node: NodeRef<'_>) -> Action;

    /// Called after a value (scalar or completed sub-tree) is produced for an
    /// element starting at `offset`. An error aborts the walk.
    fn on_value(&mut self, node: NodeRef<'_>, value: &Value, offset: u64) -> Result<()> {
        let _ = (node, value, offset);
        Ok(())
    }
}

/// Reads every recognized element.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadAll;

impl Listener for ReadAll {
    fn decide(&mut self, _node: NodeRef<'_>) -> Action {
        Action::ReadNext
    }
}

impl<F> Listener for F
where
    F: FnMut(NodeRef<'_>) -> Action,
{
    fn decide(&mut self, node: NodeRef<'_>) -> Action {
        self(node)
    }
}
