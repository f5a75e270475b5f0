use anyhow::{Result, anyhow, bail};
use log::Level::Warn;
use log::{debug, trace};

use crate::log_or_err;
use crate::process::listener::{Action, Listener};
use crate::structs::header::{
    DEFAULT_MAX_ID_WIDTH, DEFAULT_MAX_SIZE_WIDTH, ElementHeader, VOID_ID,
};
use crate::structs::schema::{NodeRef, ScalarType, Schema};
use crate::structs::tree::{ParseTree, Value};
use crate::utils::errors::{VintError, WalkError};
use crate::utils::scalar::read_value;
use crate::utils::source::ByteSource;
use crate::utils::vint::MAX_VINT_WIDTH;

/// Default limit on nested containers, the document root included.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Walks EBML element trees against a linked [`Schema`].
///
/// One walker is one parse session: it owns the configuration and the
/// counters of a walk, and borrows the schema, which may be shared with other
/// sessions on other threads.
///
/// # Example
///
/// ```rust
/// use ebmltree::process::listener::ReadAll;
/// use ebmltree::process::walk::Walker;
/// use ebmltree::process::EXAMPLE_DATA;
/// use ebmltree::structs::matroska;
/// use ebmltree::structs::schema::Schema;
/// use ebmltree::utils::source::SliceSource;
///
/// let schema = Schema::link(&matroska::dtd())?;
/// let mut walker = Walker::new(&schema);
/// let mut source = SliceSource::from_slice(EXAMPLE_DATA);
///
/// let tree = walker.walk(&mut source, &mut ReadAll)?;
/// let doc_type = tree.get_path("ebml/doc_type").and_then(|v| v.as_str());
/// assert_eq!(doc_type, Some("webm"));
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug)]
pub struct Walker<'s> {
    schema: &'s Schema,
    state: WalkerState,
}

#[derive(Debug, Clone)]
pub struct WalkerState {
    pub fail_level: log::Level,
    pub max_id_width: u8,
    pub max_size_width: u8,
    pub max_depth: usize,

    /// Bytes of unknown and void elements skipped.
    pub padding: u64,
    pub unknown_elements: usize,
    pub bound_violations: usize,
    /// Set when a listener ended the walk with [`Action::TerminateParsing`].
    pub terminated: bool,
}

impl Default for WalkerState {
    fn default() -> Self {
        Self {
            fail_level: log::Level::Error,
            max_id_width: DEFAULT_MAX_ID_WIDTH,
            max_size_width: DEFAULT_MAX_SIZE_WIDTH,
            max_depth: DEFAULT_MAX_DEPTH,

            padding: 0,
            unknown_elements: 0,
            bound_violations: 0,
            terminated: false,
        }
    }
}

struct Frame<'s> {
    node: NodeRef<'s>,
    /// Absolute end of the container body, `None` when it runs to the end of
    /// the stream.
    end: Option<u64>,
    /// Offset of the container's own header.
    offset: u64,
    tree: ParseTree,
}

enum Step<'s> {
    Continue,
    Open(Frame<'s>),
    Close,
    Terminate,
}

impl<'s> Walker<'s> {
    pub fn new(schema: &'s Schema) -> Self {
        Self {
            schema,
            state: WalkerState::default(),
        }
    }

    pub fn schema(&self) -> &'s Schema {
        self.schema
    }

    /// Sets the failure level for tolerated structural faults.
    ///
    /// - `log::Level::Error`: faults are logged and parsing continues (default)
    /// - `log::Level::Warn`: faults abort the walk (strict mode)
    pub fn set_fail_level(&mut self, level: log::Level) {
        self.state.fail_level = level;
    }

    pub fn set_max_depth(&mut self, depth: usize) {
        self.state.max_depth = depth.max(1);
    }

    pub fn set_max_id_width(&mut self, width: u8) -> Result<()> {
        self.state.max_id_width = check_width(width)?;
        Ok(())
    }

    pub fn set_max_size_width(&mut self, width: u8) -> Result<()> {
        self.state.max_size_width = check_width(width)?;
        Ok(())
    }

    /// Applies `max_id_length` and `max_size_length` from a decoded EBML header.
    ///
    /// A width outside 1..=8 is a tolerated fault: the current width is kept.
    pub fn configure_from_header(&mut self, ebml: &ParseTree) -> Result<()> {
        if let Some(width) = ebml.get("max_id_length").and_then(Value::as_u64) {
            self.state.max_id_width =
                self.header_width("max_id_length", width, self.state.max_id_width)?;
        }
        if let Some(width) = ebml.get("max_size_length").and_then(Value::as_u64) {
            self.state.max_size_width =
                self.header_width("max_size_length", width, self.state.max_size_width)?;
        }
        debug!(
            "Element widths: id <= {}, size <= {}",
            self.state.max_id_width, self.state.max_size_width
        );

        Ok(())
    }

    pub fn state(&self) -> &WalkerState {
        &self.state
    }

    pub fn padding(&self) -> u64 {
        self.state.padding
    }

    pub fn bound_violations(&self) -> usize {
        self.state.bound_violations
    }

    /// Whether the last walk was ended by [`Action::TerminateParsing`].
    pub fn terminated(&self) -> bool {
        self.state.terminated
    }

    /// Clears the per-walk counters. Called by [`Walker::walk`].
    pub fn reset(&mut self) {
        self.state.padding = 0;
        self.state.unknown_elements = 0;
        self.state.bound_violations = 0;
        self.state.terminated = false;
    }

    fn header_width(&mut self, key: &str, width: u64, current: u8) -> Result<u8> {
        match check_width(u8::try_from(width).unwrap_or(u8::MAX)) {
            Ok(width) => Ok(width),
            Err(err) => {
                log_or_err!(self.state, Warn, err);
                debug!("Ignoring {key} = {width}, keeping {current}");
                Ok(current)
            }
        }
    }

    /// Walks a whole document from the current position to the end of the
    /// stream, starting at the schema root.
    pub fn walk<S, L>(&mut self, source: &mut S, listener: &mut L) -> Result<ParseTree>
    where
        S: ByteSource,
        L: Listener,
    {
        self.reset();
        self.walk_container(source, self.schema.root(), None, listener)
    }

    /// Walks the children of `container` from the current position up to
    /// `end` (absolute offset), or to the end of the stream when `end` is
    /// `None`.
    pub fn walk_container<S, L>(
        &mut self,
        source: &mut S,
        container: NodeRef<'s>,
        end: Option<u64>,
        listener: &mut L,
    ) -> Result<ParseTree>
    where
        S: ByteSource,
        L: Listener,
    {
        if !container.is_container() {
            bail!(WalkError::NotAContainer(container.path()));
        }

        let mut current = Frame {
            node: container,
            end,
            offset: source.position()?,
            tree: ParseTree::new(),
        };
        let mut parents: Vec<Frame<'s>> = Vec::new();

        loop {
            match self.step(source, listener, &mut current)? {
                Step::Continue => {}
                Step::Open(child) => {
                    if parents.len() + 1 >= self.state.max_depth {
                        bail!(WalkError::MaxDepthExceeded {
                            path: child.node.path(),
                            max_depth: self.state.max_depth,
                        });
                    }
                    parents.push(std::mem::replace(&mut current, child));
                }
                Step::Close => {
                    let Some(parent) = parents.pop() else {
                        return Ok(current.tree);
                    };
                    let done = std::mem::replace(&mut current, parent);
                    trace!("Leave {} at {}", done.node, source.position()?);

                    let value = Value::Tree(done.tree);
                    listener.on_value(done.node, &value, done.offset)?;
                    current
                        .tree
                        .store(done.node.name(), done.node.multiple(), value);
                }
                Step::Terminate => {
                    self.state.terminated = true;
                    while let Some(parent) = parents.pop() {
                        let done = std::mem::replace(&mut current, parent);
                        current.tree.store(
                            done.node.name(),
                            done.node.multiple(),
                            Value::Tree(done.tree),
                        );
                    }
                    return Ok(current.tree);
                }
            }
        }
    }

    fn step<S, L>(
        &mut self,
        source: &mut S,
        listener: &mut L,
        frame: &mut Frame<'s>,
    ) -> Result<Step<'s>>
    where
        S: ByteSource,
        L: Listener,
    {
        if let Some(end) = frame.end {
            if source.position()? >= end {
                return Ok(Step::Close);
            }
        }

        let Some(header) =
            ElementHeader::read(source, self.state.max_id_width, self.state.max_size_width)?
        else {
            trace!("End of stream inside {}", frame.node);
            return Ok(Step::Close);
        };

        let child = frame.node.child(header.id);
        let len = self.clamp(frame, child, &header)?;

        let Some(child) = child else {
            return self.skip_unknown(source, frame, &header, len);
        };

        trace!(
            "Element {child} id={:#X} size={} at {}",
            header.id, header.size, header.offset
        );

        let action = listener.decide(child);
        if action != Action::ReadNext {
            debug!("{action:?} {child} at {}", header.offset);
        }

        match action {
            Action::ReadNext => match child.scalar_type() {
                None => {
                    let end = match len {
                        Some(len) => Some(header.body_offset() + len),
                        None => frame.end,
                    };
                    Ok(Step::Open(Frame {
                        node: child,
                        end,
                        offset: header.offset,
                        tree: ParseTree::new(),
                    }))
                }
                Some(ty) => {
                    let Some(len) = len else {
                        log_or_err!(
                            self.state,
                            Warn,
                            anyhow!(WalkError::UnboundedElement {
                                id: header.id,
                                offset: header.offset,
                            })
                        );
                        return self.skip_to_end(source, frame);
                    };
                    self.read_scalar(source, listener, frame, child, ty, &header, len)?;
                    Ok(Step::Continue)
                }
            },
            Action::IgnoreElement => match len {
                Some(len) => {
                    self.skip(source, len)?;
                    Ok(Step::Continue)
                }
                None => self.skip_to_end(source, frame),
            },
            Action::SkipSiblings => self.skip_to_end(source, frame),
            Action::TerminateParsing => Ok(Step::Terminate),
            Action::SkipElement => Ok(Step::Continue),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn read_scalar<S, L>(
        &mut self,
        source: &mut S,
        listener: &mut L,
        frame: &mut Frame<'s>,
        child: NodeRef<'s>,
        ty: ScalarType,
        header: &ElementHeader,
        len: u64,
    ) -> Result<()>
    where
        S: ByteSource,
        L: Listener,
    {
        let value = match read_value(source, ty, len)? {
            Ok(value) => Some(value),
            Err(fault) => {
                let path = child.path();
                let err = match ty {
                    ScalarType::Uint | ScalarType::Bool => WalkError::UintTooWide { path, length: len },
                    ScalarType::Int => WalkError::IntTooWide { path, length: len },
                    ScalarType::Float => WalkError::FloatWidth { path, length: len },
                    ScalarType::Date => WalkError::DateWidth { path, length: len },
                    ScalarType::Str | ScalarType::Binary | ScalarType::Uid => {
                        unreachable!("{ty:?} bodies decode at any width")
                    }
                };
                log_or_err!(self.state, Warn, anyhow!(err));
                fault.fallback
            }
        };

        if let Some(value) = value {
            listener.on_value(child, &value, header.offset)?;
            frame.tree.store(child.name(), child.multiple(), value);
        }

        Ok(())
    }

    /// Effective body length: the declared size, cut to what is left of the
    /// enclosing container. `None` for unknown sizes.
    fn clamp(
        &mut self,
        frame: &Frame<'s>,
        child: Option<NodeRef<'s>>,
        header: &ElementHeader,
    ) -> Result<Option<u64>> {
        let Some(len) = header.size.known() else {
            return Ok(None);
        };
        let Some(end) = frame.end else {
            return Ok(Some(len));
        };

        let available = end.saturating_sub(header.body_offset());
        if len <= available {
            return Ok(Some(len));
        }

        self.state.bound_violations += 1;
        let path = match child {
            Some(child) => child.path(),
            None => format!("{}/[{:#X}]", frame.node, header.id),
        };
        log_or_err!(
            self.state,
            Warn,
            anyhow!(WalkError::BoundViolation {
                path,
                offset: header.offset,
                declared: len,
                available,
            })
        );

        Ok(Some(available))
    }

    fn skip_unknown<S: ByteSource>(
        &mut self,
        source: &mut S,
        frame: &Frame<'s>,
        header: &ElementHeader,
        len: Option<u64>,
    ) -> Result<Step<'s>> {
        self.state.unknown_elements += 1;

        if header.id == VOID_ID {
            trace!("Void element in {} at {}", frame.node, header.offset);
        } else {
            debug!(
                "Unknown element {:#X} in {} at {}, size {}",
                header.id, frame.node, header.offset, header.size
            );
        }

        let len = match (len, frame.end) {
            (Some(len), _) => len,
            (None, Some(end)) => end.saturating_sub(header.body_offset()),
            (None, None) => {
                log_or_err!(
                    self.state,
                    Warn,
                    anyhow!(WalkError::UnboundedElement {
                        id: header.id,
                        offset: header.offset,
                    })
                );
                let rest = source.available()?;
                self.state.padding += rest;
                self.skip(source, rest)?;
                return Ok(Step::Close);
            }
        };

        self.state.padding += len;
        self.skip(source, len)?;

        Ok(Step::Continue)
    }

    /// Skips the rest of `frame`, which for an unbounded frame is the rest of
    /// the stream.
    fn skip_to_end<S: ByteSource>(&mut self, source: &mut S, frame: &Frame<'s>) -> Result<Step<'s>> {
        let rest = match frame.end {
            Some(end) => end.saturating_sub(source.position()?),
            None => source.available()?,
        };
        self.skip(source, rest)?;

        Ok(Step::Close)
    }

    fn skip<S: ByteSource>(&mut self, source: &mut S, len: u64) -> Result<()> {
        let skipped = source.skip(len)?;
        if skipped < len {
            debug!(
                "Stream ended {} bytes into a {} byte skip",
                skipped, len
            );
        }

        Ok(())
    }
}

fn check_width(width: u8) -> Result<u8> {
    if width == 0 || width > MAX_VINT_WIDTH {
        bail!(VintError::InvalidMaxWidth(width));
    }
    Ok(width)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::listener::ReadAll;
    use crate::structs::schema::ElementDef;
    use crate::utils::errors::StreamError;
    use crate::utils::fixtures::{
        concat, element, element_unknown_size, element_with_size, uint_body,
    };
    use crate::utils::source::SliceSource;

    fn test_schema() -> Schema {
        let def = ElementDef::root([
            ElementDef::container(
                0xA0,
                "outer",
                [
                    ElementDef::uint(0x81, "child_a"),
                    ElementDef::string(0x82, "child_b"),
                    ElementDef::container(
                        0xA1,
                        "inner",
                        [
                            ElementDef::uint(0x81, "a"),
                            ElementDef::string(0x82, "b"),
                            ElementDef::container(0xA2, "deep", [ElementDef::uint(0x81, "x")]),
                        ],
                    ),
                    ElementDef::container(0xA3, "entry", [ElementDef::uint(0x81, "n")]).multiple(),
                    ElementDef::float(0x84, "rate"),
                    ElementDef::string(0x85, "tag").multiple(),
                ],
            ),
            ElementDef::uint(0x83, "after"),
        ]);
        Schema::link(&def).unwrap()
    }

    fn outer(tree: &ParseTree) -> &ParseTree {
        tree.get("outer").and_then(Value::as_tree).unwrap()
    }

    #[test]
    fn container_with_two_scalars() -> Result<()> {
        let schema = test_schema();
        let bytes = element(
            0xA0,
            &concat(&[element(0x81, &[7]), element(0x82, b"hi")]),
        );
        let mut src = SliceSource::from_slice(&bytes);

        let tree = Walker::new(&schema).walk(&mut src, &mut ReadAll)?;

        let outer = outer(&tree);
        assert_eq!(outer.len(), 2);
        assert_eq!(outer.get("child_a"), Some(&Value::Uint(7)));
        assert_eq!(outer.get("child_b"), Some(&Value::Str("hi".into())));
        assert_eq!(src.position()?, bytes.len() as u64);

        Ok(())
    }

    #[test]
    fn unknown_element_counted_as_padding() -> Result<()> {
        let schema = test_schema();
        let bytes = element(
            0xA0,
            &concat(&[
                element(0x4D80, &[0xAB; 5]),
                element(VOID_ID, &[0; 3]),
                element(0x81, &[1]),
            ]),
        );
        let mut src = SliceSource::from_slice(&bytes);
        let mut walker = Walker::new(&schema);

        let tree = walker.walk(&mut src, &mut ReadAll)?;

        assert_eq!(outer(&tree).len(), 1);
        assert_eq!(outer(&tree).get("child_a"), Some(&Value::Uint(1)));
        assert_eq!(walker.padding(), 8);
        assert_eq!(walker.state().unknown_elements, 2);
        assert_eq!(src.position()?, bytes.len() as u64);

        // counters restart with every top-level walk
        let mut src = SliceSource::from_slice(&[]);
        walker.walk(&mut src, &mut ReadAll)?;
        assert_eq!(walker.padding(), 0);

        Ok(())
    }

    #[test]
    fn unknown_size_child_ends_at_parent_bound() -> Result<()> {
        let schema = test_schema();
        let inner = element_unknown_size(
            0xA1,
            &concat(&[element(0x81, &[7]), element(0x82, b"hello, world!")]),
        );
        assert_eq!(inner.len(), 20);

        let bytes = concat(&[element(0xA0, &inner), element(0x83, &[9])]);
        let mut src = SliceSource::from_slice(&bytes);
        let mut walker = Walker::new(&schema);

        let tree = walker.walk(&mut src, &mut ReadAll)?;

        let inner = outer(&tree).get("inner").and_then(Value::as_tree).unwrap();
        assert_eq!(inner.get("a"), Some(&Value::Uint(7)));
        assert_eq!(inner.get("b"), Some(&Value::Str("hello, world!".into())));
        assert_eq!(tree.get("after"), Some(&Value::Uint(9)));
        assert_eq!(walker.padding(), 0);

        Ok(())
    }

    #[test]
    fn skip_siblings_abandons_container() -> Result<()> {
        let schema = test_schema();
        let body = concat(&[
            element(0x81, &[1]),
            element(0x82, b"two"),
            element(0x84, &2.0f64.to_be_bytes()),
        ]);
        let first = element(0xA0, &body);
        let bytes = concat(&[first.clone(), element(0x83, &[3])]);
        let mut src = SliceSource::from_slice(&bytes);

        let mut seen = Vec::new();
        let mut listener = |node: NodeRef<'_>| {
            seen.push(node.name());
            match node.name() {
                "child_a" => Action::SkipSiblings,
                _ => Action::ReadNext,
            }
        };
        let mut walker = Walker::new(&schema);
        let tree = walker.walk_container(&mut src, schema.root(), None, &mut listener)?;

        assert!(outer(&tree).is_empty());
        assert_eq!(tree.get("after"), Some(&Value::Uint(3)));
        assert_eq!(seen, ["outer", "child_a", "after"]);

        Ok(())
    }

    #[test]
    fn skip_siblings_lands_on_container_end() -> Result<()> {
        let schema = test_schema();
        let body = concat(&[element(0x81, &[1]), element(0x82, b"two"), element(0x85, b"x")]);
        let bytes = element(0xA0, &body);
        let mut src = SliceSource::from_slice(&bytes);
        let container = schema.find_path("outer").unwrap();

        // position the source on the body, as a caller handling the header would
        src.skip(2)?;
        let mut walker = Walker::new(&schema);
        let tree = walker.walk_container(
            &mut src,
            container,
            Some(bytes.len() as u64),
            &mut |_: NodeRef<'_>| Action::SkipSiblings,
        )?;

        assert!(tree.is_empty());
        assert_eq!(src.position()?, bytes.len() as u64);

        Ok(())
    }

    #[test]
    fn clean_truncation_keeps_partial_tree() -> Result<()> {
        let schema = test_schema();
        let body = concat(&[element(0x81, &[5]), element(0x82, b"cut")]);
        let bytes = element_with_size(0xA0, 100, &body);
        let mut src = SliceSource::from_slice(&bytes);

        let tree = Walker::new(&schema).walk(&mut src, &mut ReadAll)?;

        assert_eq!(outer(&tree).get("child_a"), Some(&Value::Uint(5)));
        assert_eq!(outer(&tree).get("child_b"), Some(&Value::Str("cut".into())));

        Ok(())
    }

    #[test]
    fn truncated_scalar_is_an_error() {
        let schema = test_schema();
        let mut bytes = element(0xA0, &element(0x82, b"complete"));
        bytes.truncate(bytes.len() - 3);
        let mut src = SliceSource::from_slice(&bytes);

        let err = Walker::new(&schema)
            .walk(&mut src, &mut ReadAll)
            .unwrap_err();
        assert!(err.downcast_ref::<StreamError>().is_some());
    }

    #[test]
    fn repeatable_elements_collect() -> Result<()> {
        let schema = test_schema();
        let body = concat(&[
            element(0xA3, &element(0x81, &[1])),
            element(0x85, b"x"),
            element(0xA3, &element(0x81, &[2])),
            element(0x85, b"y"),
        ]);
        let bytes = element(0xA0, &body);
        let mut src = SliceSource::from_slice(&bytes);

        let tree = Walker::new(&schema).walk(&mut src, &mut ReadAll)?;

        let entries = outer(&tree).get("entry").unwrap().items();
        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries[1].as_tree().and_then(|t| t.get("n")),
            Some(&Value::Uint(2))
        );
        assert_eq!(
            outer(&tree).get("tag"),
            Some(&Value::List(vec![Value::Str("x".into()), Value::Str("y".into())]))
        );

        Ok(())
    }

    #[test]
    fn ignore_element_skips_body() -> Result<()> {
        let schema = test_schema();
        let body = concat(&[
            element(0xA1, &element(0x81, &uint_body(300))),
            element(0x81, &[4]),
        ]);
        let bytes = element(0xA0, &body);
        let mut src = SliceSource::from_slice(&bytes);

        let mut listener = |node: NodeRef<'_>| match node.name() {
            "inner" => Action::IgnoreElement,
            _ => Action::ReadNext,
        };
        let mut walker = Walker::new(&schema);
        let tree = walker.walk(&mut src, &mut listener)?;

        assert!(!outer(&tree).contains("inner"));
        assert_eq!(outer(&tree).get("child_a"), Some(&Value::Uint(4)));
        assert_eq!(walker.padding(), 0);

        Ok(())
    }

    #[test]
    fn skip_element_reads_body_as_siblings() -> Result<()> {
        let schema = test_schema();
        // inner's children are read at outer level: 0x81 matches child_a there,
        // 0xA2 is unknown to outer and becomes padding
        let inner_body = concat(&[element(0x81, &[8]), element(0xA2, &element(0x81, &[1]))]);
        let bytes = element(0xA0, &element(0xA1, &inner_body));
        let mut src = SliceSource::from_slice(&bytes);

        let mut listener = |node: NodeRef<'_>| match node.name() {
            "inner" => Action::SkipElement,
            _ => Action::ReadNext,
        };
        let mut walker = Walker::new(&schema);
        let tree = walker.walk(&mut src, &mut listener)?;

        assert!(!outer(&tree).contains("inner"));
        assert_eq!(outer(&tree).get("child_a"), Some(&Value::Uint(8)));
        assert_eq!(walker.padding(), 3);

        Ok(())
    }

    #[test]
    fn terminate_keeps_partial_trees_at_every_level() -> Result<()> {
        let schema = test_schema();
        let inner = element(
            0xA1,
            &concat(&[element(0x81, &[1]), element(0x82, b"stop"), element(0x81, &[2])]),
        );
        let bytes = concat(&[
            element(0xA0, &concat(&[element(0x81, &[9]), inner])),
            element(0x83, &[3]),
        ]);
        let mut src = SliceSource::from_slice(&bytes);

        let mut listener = |node: NodeRef<'_>| match node.path().as_str() {
            "outer/inner/b" => Action::TerminateParsing,
            _ => Action::ReadNext,
        };
        let mut walker = Walker::new(&schema);
        let tree = walker.walk(&mut src, &mut listener)?;
        assert!(walker.terminated());

        let outer = outer(&tree);
        assert_eq!(outer.get("child_a"), Some(&Value::Uint(9)));
        let inner = outer.get("inner").and_then(Value::as_tree).unwrap();
        assert_eq!(inner.get("a"), Some(&Value::Uint(1)));
        assert!(!inner.contains("b"));
        assert!(!tree.contains("after"));

        Ok(())
    }

    #[test]
    fn bound_violation_is_clamped() -> Result<()> {
        let schema = test_schema();
        // child_b claims 10 bytes but outer only has 4 left after its header
        let body = concat(&[element(0x81, &[1]), element_with_size(0x82, 10, b"abcd")]);
        let bytes = concat(&[element(0xA0, &body), element(0x83, &[6])]);
        let mut src = SliceSource::from_slice(&bytes);
        let mut walker = Walker::new(&schema);

        let tree = walker.walk(&mut src, &mut ReadAll)?;

        assert_eq!(outer(&tree).get("child_b"), Some(&Value::Str("abcd".into())));
        assert_eq!(tree.get("after"), Some(&Value::Uint(6)));
        assert_eq!(walker.bound_violations(), 1);

        Ok(())
    }

    #[test]
    fn strict_mode_fails_on_bound_violation() {
        let schema = test_schema();
        let body = element_with_size(0x82, 10, b"abcd");
        let bytes = element(0xA0, &body);
        let mut src = SliceSource::from_slice(&bytes);
        let mut walker = Walker::new(&schema);
        walker.set_fail_level(log::Level::Warn);

        let err = walker.walk(&mut src, &mut ReadAll).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<WalkError>(),
            Some(WalkError::BoundViolation {
                declared: 10,
                available: 4,
                ..
            })
        ));
    }

    #[test]
    fn depth_limit() -> Result<()> {
        let schema = test_schema();
        let deep = element(0xA2, &element(0x81, &[1]));
        let bytes = element(0xA0, &element(0xA1, &deep));

        let mut walker = Walker::new(&schema);
        walker.set_max_depth(4);
        let tree = walker.walk(&mut SliceSource::from_slice(&bytes), &mut ReadAll)?;
        assert_eq!(
            tree.get_path("outer/inner/deep/x"),
            Some(&Value::Uint(1))
        );

        walker.set_max_depth(3);
        let err = walker
            .walk(&mut SliceSource::from_slice(&bytes), &mut ReadAll)
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<WalkError>(),
            Some(&WalkError::MaxDepthExceeded {
                path: "outer/inner/deep".into(),
                max_depth: 3,
            })
        );

        Ok(())
    }

    #[test]
    fn on_value_sees_children_before_parents() -> Result<()> {
        struct Recorder(Vec<(String, u64)>);

        impl Listener for Recorder {
            fn decide(&mut self, _node: NodeRef<'_>) -> Action {
                Action::ReadNext
            }

            fn on_value(&mut self, node: NodeRef<'_>, _value: &Value, offset: u64) -> Result<()> {
                self.0.push((node.path(), offset));
                Ok(())
            }
        }

        let schema = test_schema();
        let bytes = element(0xA0, &concat(&[element(0x81, &[1]), element(0x82, b"z")]));
        let mut recorder = Recorder(Vec::new());
        Walker::new(&schema).walk(&mut SliceSource::from_slice(&bytes), &mut recorder)?;

        assert_eq!(
            recorder.0,
            [
                ("outer/child_a".to_string(), 2),
                ("outer/child_b".to_string(), 5),
                ("outer".to_string(), 0),
            ]
        );

        Ok(())
    }

    #[test]
    fn oversized_uint_keeps_sentinel() -> Result<()> {
        let schema = test_schema();
        let bytes = element(0xA0, &concat(&[element(0x81, &[1; 9]), element(0x82, b"ok")]));
        let mut walker = Walker::new(&schema);

        let tree = walker.walk(&mut SliceSource::from_slice(&bytes), &mut ReadAll)?;

        assert_eq!(outer(&tree).get("child_a"), Some(&Value::Int(-1)));
        assert_eq!(outer(&tree).get("child_b"), Some(&Value::Str("ok".into())));

        walker.set_fail_level(log::Level::Warn);
        let err = walker
            .walk(&mut SliceSource::from_slice(&bytes), &mut ReadAll)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<WalkError>(),
            Some(WalkError::UintTooWide { length: 9, .. })
        ));

        Ok(())
    }

    #[test]
    fn unbounded_unknown_element_stops_level() -> Result<()> {
        let schema = test_schema();
        let bytes = concat(&[element(0x83, &[1]), element_unknown_size(0x4D80, &[0; 4])]);
        let mut walker = Walker::new(&schema);

        let mut src = SliceSource::from_slice(&bytes);
        let tree = walker.walk(&mut src, &mut ReadAll)?;
        assert_eq!(tree.get("after"), Some(&Value::Uint(1)));
        assert_eq!(walker.padding(), 4);
        assert_eq!(src.position()?, bytes.len() as u64);

        walker.set_fail_level(log::Level::Warn);
        let err = walker
            .walk(&mut SliceSource::from_slice(&bytes), &mut ReadAll)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<WalkError>(),
            Some(WalkError::UnboundedElement { id: 0x4D80, .. })
        ));

        Ok(())
    }

    #[test]
    fn sessions_share_one_schema() -> Result<()> {
        let schema = test_schema();
        let files: Vec<Vec<u8>> = (0..4u8)
            .map(|n| element(0xA0, &element(0x81, &[n])))
            .collect();

        let results: Vec<Result<ParseTree>> = std::thread::scope(|scope| {
            let handles: Vec<_> = files
                .iter()
                .map(|bytes| {
                    let schema = &schema;
                    scope.spawn(move || {
                        Walker::new(schema).walk(&mut SliceSource::from_slice(bytes), &mut ReadAll)
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("walker thread panicked"))
                .collect()
        });

        for (n, result) in results.into_iter().enumerate() {
            let tree = result?;
            assert_eq!(outer(&tree).get("child_a"), Some(&Value::Uint(n as u64)));
        }

        Ok(())
    }

    #[test]
    fn header_widths_from_ebml_tree() -> Result<()> {
        let schema = test_schema();
        let mut walker = Walker::new(&schema);

        let mut ebml = ParseTree::new();
        ebml.store("max_id_length", false, Value::Uint(2));
        ebml.store("max_size_length", false, Value::Uint(4));
        walker.configure_from_header(&ebml)?;
        assert_eq!(walker.state().max_id_width, 2);
        assert_eq!(walker.state().max_size_width, 4);

        // out of range widths are tolerated and leave the current width alone
        ebml.store("max_size_length", false, Value::Uint(9));
        walker.configure_from_header(&ebml)?;
        assert_eq!(walker.state().max_size_width, 4);

        walker.set_fail_level(log::Level::Warn);
        let err = walker.configure_from_header(&ebml).unwrap_err();
        assert_eq!(
            err.downcast_ref::<VintError>(),
            Some(&VintError::InvalidMaxWidth(9))
        );

        Ok(())
    }

    #[test]
    fn skip_siblings_in_unbounded_container() -> Result<()> {
        let schema = test_schema();
        let bytes = concat(&[
            element_unknown_size(0xA0, &element(0x81, &[1])),
            element(0x83, &[9]),
        ]);
        let mut src = SliceSource::from_slice(&bytes);

        let mut listener = |node: NodeRef<'_>| match node.name() {
            "child_a" => Action::SkipSiblings,
            _ => Action::ReadNext,
        };
        let mut walker = Walker::new(&schema);
        walker.set_fail_level(log::Level::Warn);
        let tree = walker.walk(&mut src, &mut listener)?;

        // outer has no bound of its own, so it runs to the end of the stream
        assert!(outer(&tree).is_empty());
        assert!(!tree.contains("after"));
        assert_eq!(src.position()?, bytes.len() as u64);
        assert!(!walker.terminated());

        Ok(())
    }

    #[test]
    fn ignored_unknown_size_element_consumes_the_stream() -> Result<()> {
        let schema = test_schema();
        let bytes = concat(&[
            element(0x83, &[1]),
            element_unknown_size(0xA0, &concat(&[element(0x81, &[2]), element(0x83, &[3])])),
        ]);
        let mut src = SliceSource::from_slice(&bytes);

        let mut listener = |node: NodeRef<'_>| match node.name() {
            "outer" => Action::IgnoreElement,
            _ => Action::ReadNext,
        };
        let mut walker = Walker::new(&schema);
        walker.set_fail_level(log::Level::Warn);
        let tree = walker.walk(&mut src, &mut listener)?;

        assert_eq!(tree.len(), 1);
        assert_eq!(tree.get("after"), Some(&Value::Uint(1)));
        assert_eq!(walker.padding(), 0);
        assert_eq!(src.position()?, bytes.len() as u64);

        Ok(())
    }

    #[test]
    fn unbounded_scalar_consumes_the_stream() -> Result<()> {
        let schema = test_schema();
        let bytes = concat(&[element_unknown_size(0x83, &[1, 2]), element(0x83, &[3])]);
        let mut src = SliceSource::from_slice(&bytes);
        let mut walker = Walker::new(&schema);

        let tree = walker.walk(&mut src, &mut ReadAll)?;
        assert!(tree.is_empty());
        assert_eq!(src.position()?, bytes.len() as u64);

        walker.set_fail_level(log::Level::Warn);
        let err = walker
            .walk(&mut SliceSource::from_slice(&bytes), &mut ReadAll)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<WalkError>(),
            Some(WalkError::UnboundedElement { id: 0x83, offset: 0 })
        ));

        Ok(())
    }

    #[test]
    fn terminated_flag_cleared_by_next_walk() -> Result<()> {
        let schema = test_schema();
        let bytes = element(0x83, &[1]);
        let mut walker = Walker::new(&schema);

        walker.walk(
            &mut SliceSource::from_slice(&bytes),
            &mut |_: NodeRef<'_>| Action::TerminateParsing,
        )?;
        assert!(walker.terminated());

        walker.walk(&mut SliceSource::from_slice(&bytes), &mut ReadAll)?;
        assert!(!walker.terminated());

        Ok(())
    }
}
