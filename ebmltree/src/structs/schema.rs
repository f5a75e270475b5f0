//! Element schemas (DTDs).
//!
//! A schema is written once as a tree of [`ElementDef`] values, then linked
//! into a [`Schema`]: an arena of nodes where each container maps child ids to
//! node indices and every node knows its parent index. The linked form is
//! immutable and can be shared by any number of concurrent parse sessions.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt::{Debug, Display, Formatter};

use anyhow::{Result, bail};
use log::debug;

use crate::utils::errors::SchemaError;

/// Value type of a scalar element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    /// Big-endian unsigned integer, 0 to 8 octets.
    Uint,
    /// Big-endian two's complement integer, 0 to 8 octets.
    Int,
    /// UTF-8 text, cut at the first NUL.
    Str,
    /// Unsigned integer equal to 1.
    Bool,
    /// IEEE-754 float, 0, 4, 8 or 10 octets.
    Float,
    /// Nanoseconds since 2001-01-01T00:00:00 UTC.
    Date,
    /// Opaque bytes.
    Binary,
    /// Opaque identifier bytes.
    Uid,
}

impl Display for ScalarType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Uint => "uint",
            Self::Int => "int",
            Self::Str => "string",
            Self::Bool => "bool",
            Self::Float => "float",
            Self::Date => "date",
            Self::Binary => "binary",
            Self::Uid => "uid",
        })
    }
}

#[derive(Debug, Clone)]
pub enum ElementKind {
    Scalar(ScalarType),
    Container(Vec<ElementDef>),
}

/// Static description of one element, as written in a format module.
#[derive(Debug, Clone)]
pub struct ElementDef {
    pub id: u64,
    pub name: &'static str,
    pub kind: ElementKind,
    /// Occurrences are collected into a list instead of overwriting one slot.
    pub multiple: bool,
}

impl ElementDef {
    /// Unnamed document root holding the top-level elements.
    pub fn root(children: impl Into<Vec<ElementDef>>) -> Self {
        Self::container(0, "", children)
    }

    pub fn container(id: u64, name: &'static str, children: impl Into<Vec<ElementDef>>) -> Self {
        Self {
            id,
            name,
            kind: ElementKind::Container(children.into()),
            multiple: false,
        }
    }

    pub fn scalar(id: u64, name: &'static str, ty: ScalarType) -> Self {
        Self {
            id,
            name,
            kind: ElementKind::Scalar(ty),
            multiple: false,
        }
    }

    pub fn uint(id: u64, name: &'static str) -> Self {
        Self::scalar(id, name, ScalarType::Uint)
    }

    pub fn int(id: u64, name: &'static str) -> Self {
        Self::scalar(id, name, ScalarType::Int)
    }

    pub fn string(id: u64, name: &'static str) -> Self {
        Self::scalar(id, name, ScalarType::Str)
    }

    pub fn bool(id: u64, name: &'static str) -> Self {
        Self::scalar(id, name, ScalarType::Bool)
    }

    pub fn float(id: u64, name: &'static str) -> Self {
        Self::scalar(id, name, ScalarType::Float)
    }

    pub fn date(id: u64, name: &'static str) -> Self {
        Self::scalar(id, name, ScalarType::Date)
    }

    pub fn binary(id: u64, name: &'static str) -> Self {
        Self::scalar(id, name, ScalarType::Binary)
    }

    pub fn uid(id: u64, name: &'static str) -> Self {
        Self::scalar(id, name, ScalarType::Uid)
    }

    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }
}

/// Index of a node inside a linked [`Schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);
}

#[derive(Debug)]
enum NodeKind {
    Scalar(ScalarType),
    Container(HashMap<u64, NodeId>),
}

#[derive(Debug)]
struct Node {
    id: u64,
    name: &'static str,
    multiple: bool,
    parent: Option<NodeId>,
    kind: NodeKind,
}

/// Linked, read-only schema.
#[derive(Debug)]
pub struct Schema {
    nodes: Vec<Node>,
}

impl Schema {
    /// Links a schema definition. The definition is left untouched, so linking
    /// it again yields an identical schema.
    pub fn link(root: &ElementDef) -> Result<Self> {
        if let ElementKind::Scalar(_) = root.kind {
            bail!(SchemaError::ScalarRoot(root.name));
        }

        let mut nodes: Vec<Node> = Vec::new();
        let mut pending: Vec<(&ElementDef, Option<NodeId>)> = vec![(root, None)];

        while let Some((def, parent)) = pending.pop() {
            let index = NodeId(nodes.len() as u32);

            if let Some(parent) = parent {
                let existing = match &nodes[parent.0 as usize].kind {
                    NodeKind::Container(children) => children.get(&def.id).copied(),
                    NodeKind::Scalar(_) => None,
                };
                if let Some(first) = existing {
                    bail!(SchemaError::DuplicateSiblingId {
                        id: def.id,
                        parent: path_of(&nodes, parent),
                        first: nodes[first.0 as usize].name,
                        second: def.name,
                    });
                }
                if let NodeKind::Container(children) = &mut nodes[parent.0 as usize].kind {
                    if let Entry::Vacant(slot) = children.entry(def.id) {
                        slot.insert(index);
                    }
                }
            }

            let kind = match &def.kind {
                ElementKind::Scalar(ty) => NodeKind::Scalar(*ty),
                ElementKind::Container(children) => {
                    pending.extend(children.iter().rev().map(|child| (child, Some(index))));
                    NodeKind::Container(HashMap::with_capacity(children.len()))
                }
            };

            nodes.push(Node {
                id: def.id,
                name: def.name,
                multiple: def.multiple,
                parent,
                kind,
            });
        }

        debug!("Linked schema with {} elements", nodes.len());

        Ok(Self { nodes })
    }

    pub fn root(&self) -> NodeRef<'_> {
        self.node(NodeId::ROOT)
    }

    pub fn node(&self, index: NodeId) -> NodeRef<'_> {
        NodeRef {
            schema: self,
            index,
        }
    }

    /// Finds the child of `container` with element id `id`. Only direct
    /// children are searched.
    pub fn lookup(&self, container: NodeId, id: u64) -> Option<NodeId> {
        match &self.nodes.get(container.0 as usize)?.kind {
            NodeKind::Container(children) => children.get(&id).copied(),
            NodeKind::Scalar(_) => None,
        }
    }

    /// Resolves a slash separated path of element names, e.g. `"segment/info"`.
    pub fn find_path(&self, path: &str) -> Option<NodeRef<'_>> {
        path.split('/')
            .filter(|part| !part.is_empty())
            .try_fold(self.root(), |node, part| {
                node.children().find(|child| child.name() == part)
            })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn get(&self, index: NodeId) -> &Node {
        &self.nodes[index.0 as usize]
    }
}

fn path_of(nodes: &[Node], index: NodeId) -> String {
    let mut names = Vec::new();
    let mut cursor = Some(index);

    while let Some(i) = cursor {
        let node = &nodes[i.0 as usize];
        if !node.name.is_empty() {
            names.push(node.name);
        }
        cursor = node.parent;
    }

    names.reverse();
    names.join("/")
}

/// Borrowed view of one schema node.
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    schema: &'a Schema,
    index: NodeId,
}

impl<'a> NodeRef<'a> {
    pub fn index(&self) -> NodeId {
        self.index
    }

    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    pub fn element_id(&self) -> u64 {
        self.schema.get(self.index).id
    }

    pub fn name(&self) -> &'static str {
        self.schema.get(self.index).name
    }

    pub fn multiple(&self) -> bool {
        self.schema.get(self.index).multiple
    }

    pub fn scalar_type(&self) -> Option<ScalarType> {
        match self.schema.get(self.index).kind {
            NodeKind::Scalar(ty) => Some(ty),
            NodeKind::Container(_) => None,
        }
    }

    pub fn is_container(&self) -> bool {
        self.scalar_type().is_none()
    }

    pub fn parent(&self) -> Option<NodeRef<'a>> {
        self.schema
            .get(self.index)
            .parent
            .map(|index| self.schema.node(index))
    }

    pub fn child(&self, id: u64) -> Option<NodeRef<'a>> {
        self.schema
            .lookup(self.index, id)
            .map(|index| self.schema.node(index))
    }

    pub fn children(self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        let schema = self.schema;
        let ids: Vec<NodeId> = match &schema.get(self.index).kind {
            NodeKind::Container(children) => children.values().copied().collect(),
            NodeKind::Scalar(_) => Vec::new(),
        };
        ids.into_iter().map(move |index| schema.node(index))
    }

    /// Number of containers above this node, the root being depth 0.
    pub fn depth(&self) -> usize {
        std::iter::successors(self.parent(), |node| node.parent()).count()
    }

    /// Human readable location such as `"segment/tracks/track_entry"`.
    pub fn path(&self) -> String {
        path_of(&self.schema.nodes, self.index)
    }
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.schema, other.schema) && self.index == other.index
    }
}

impl Eq for NodeRef<'_> {}

impl Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRef")
            .field("path", &self.path())
            .field("id", &format_args!("{:#X}", self.element_id()))
            .finish()
    }
}

impl Display for NodeRef<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let path = self.path();
        if path.is_empty() {
            f.write_str("<root>")
        } else {
            f.write_str(&path)
        }
    }
}
