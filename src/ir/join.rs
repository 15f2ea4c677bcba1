use std::collections::BTreeMap;
use std::fmt::Display;

use smol_str::SmolStr;

use crate::ir::helpers::ColumnRef;
use crate::ir::NodeId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

impl Display for JoinKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JoinKind::Inner => write!(f, "inner"),
            JoinKind::Left => write!(f, "left"),
        }
    }
}

/// Nested loop over two subtrees: every row of `left` is fed to `right`
/// through join variables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Join {
    pub kind: JoinKind,
    pub left: NodeId,
    pub right: NodeId,
    /// Variable name -> column of the left side it's bound to.
    pub vars: BTreeMap<SmolStr, ColumnRef>,
}

impl Join {
    #[must_use]
    pub fn new(kind: JoinKind, left: NodeId, right: NodeId) -> Self {
        Join {
            kind,
            left,
            right,
            vars: BTreeMap::new(),
        }
    }
}
