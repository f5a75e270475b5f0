//! Matroska and WebM.
//!
//! [`dtd`] describes the EBML header and the segment level elements used for
//! metadata. [`MatroskaMetadata::read`] walks a file with the
//! [`MatroskaListener`], which leaves media data unread, and maps the result
//! into a flat description of the file.

use std::fmt::{Display, Formatter};

use anyhow::{Result, anyhow, bail};
use log::{debug, info};

use crate::process::listener::{Action, Listener};
use crate::process::walk::{DEFAULT_MAX_DEPTH, Walker};
use crate::structs::header::{DEFAULT_MAX_ID_WIDTH, DEFAULT_MAX_SIZE_WIDTH, ElementHeader};
use crate::structs::schema::{ElementDef, NodeRef, Schema};
use crate::structs::tree::{ParseTree, Value};
use crate::utils::errors::{MatroskaError, WalkError};
use crate::utils::source::ByteSource;

pub mod ids {
    pub const EBML: u64 = 0x1A45_DFA3;
    pub const SEGMENT: u64 = 0x1853_8067;
    pub const SEEK_HEAD: u64 = 0x114D_9B74;
    pub const INFO: u64 = 0x1549_A966;
    pub const TRACKS: u64 = 0x1654_AE6B;
    pub const CUES: u64 = 0x1C53_BB6B;
    pub const CLUSTER: u64 = 0x1F43_B675;
    pub const CHAPTERS: u64 = 0x1043_A770;
    pub const ATTACHMENTS: u64 = 0x1941_A469;
    pub const TAGS: u64 = 0x1254_C367;
}

/// Document types accepted by [`read_document`].
pub const DOC_TYPES: [&str; 2] = ["matroska", "webm"];

/// Default `TimestampScale`, nanoseconds per tick.
pub const DEFAULT_TIMECODE_SCALE: u64 = 1_000_000;

/// Returns the document root definition for Matroska and WebM files.
pub fn dtd() -> ElementDef {
    ElementDef::root([
        ElementDef::container(
            ids::EBML,
            "ebml",
            [
                ElementDef::uint(0x4286, "version"),
                ElementDef::uint(0x42F7, "read_version"),
                ElementDef::uint(0x42F2, "max_id_length"),
                ElementDef::uint(0x42F3, "max_size_length"),
                ElementDef::string(0x4282, "doc_type"),
                ElementDef::uint(0x4287, "doc_type_version"),
                ElementDef::uint(0x4285, "doc_type_read_version"),
            ],
        ),
        ElementDef::container(
            ids::SEGMENT,
            "segment",
            [
                ElementDef::container(
                    ids::SEEK_HEAD,
                    "seek_head",
                    [ElementDef::container(
                        0x4DBB,
                        "seek",
                        [
                            ElementDef::binary(0x53AB, "id"),
                            ElementDef::uint(0x53AC, "position"),
                        ],
                    )
                    .multiple()],
                )
                .multiple(),
                ElementDef::container(
                    ids::INFO,
                    "info",
                    [
                        ElementDef::uid(0x73A4, "segment_uid"),
                        ElementDef::string(0x7384, "segment_filename"),
                        ElementDef::uint(0x2AD7B1, "timecode_scale"),
                        ElementDef::float(0x4489, "duration"),
                        ElementDef::date(0x4461, "date_utc"),
                        ElementDef::string(0x7BA9, "title"),
                        ElementDef::string(0x4D80, "muxing_app"),
                        ElementDef::string(0x5741, "writing_app"),
                    ],
                ),
                ElementDef::container(
                    ids::TRACKS,
                    "tracks",
                    [ElementDef::container(0xAE, "track_entry", track_entry()).multiple()],
                ),
                ElementDef::container(
                    ids::CUES,
                    "cues",
                    [ElementDef::container(
                        0xBB,
                        "cue_point",
                        [
                            ElementDef::uint(0xB3, "time"),
                            ElementDef::container(
                                0xB7,
                                "track_positions",
                                [
                                    ElementDef::uint(0xF7, "track"),
                                    ElementDef::uint(0xF1, "cluster_position"),
                                ],
                            )
                            .multiple(),
                        ],
                    )
                    .multiple()],
                ),
                ElementDef::container(
                    ids::CLUSTER,
                    "cluster",
                    [
                        ElementDef::uint(0xE7, "timecode"),
                        ElementDef::binary(0xA3, "simple_block").multiple(),
                        ElementDef::container(
                            0xA0,
                            "block_group",
                            [
                                ElementDef::binary(0xA1, "block"),
                                ElementDef::uint(0x9B, "duration"),
                            ],
                        )
                        .multiple(),
                    ],
                )
                .multiple(),
                ElementDef::container(
                    ids::CHAPTERS,
                    "chapters",
                    [ElementDef::container(
                        0x45B9,
                        "edition_entry",
                        [ElementDef::container(
                            0xB6,
                            "chapter_atom",
                            [
                                ElementDef::uint(0x73C4, "uid"),
                                ElementDef::uint(0x91, "time_start"),
                                ElementDef::uint(0x92, "time_end"),
                                ElementDef::container(
                                    0x80,
                                    "display",
                                    [
                                        ElementDef::string(0x85, "string"),
                                        ElementDef::string(0x437C, "language").multiple(),
                                    ],
                                )
                                .multiple(),
                            ],
                        )
                        .multiple()],
                    )
                    .multiple()],
                ),
                ElementDef::container(
                    ids::ATTACHMENTS,
                    "attachments",
                    [ElementDef::container(
                        0x61A7,
                        "attached_file",
                        [
                            ElementDef::string(0x467E, "description"),
                            ElementDef::string(0x466E, "name"),
                            ElementDef::string(0x4660, "mime_type"),
                            ElementDef::binary(0x465C, "data"),
                            ElementDef::uint(0x46AE, "uid"),
                        ],
                    )
                    .multiple()],
                ),
                ElementDef::container(
                    ids::TAGS,
                    "tags",
                    [ElementDef::container(
                        0x7373,
                        "tag",
                        [
                            ElementDef::container(
                                0x63C0,
                                "targets",
                                [
                                    ElementDef::uint(0x68CA, "target_type_value"),
                                    ElementDef::string(0x63CA, "target_type"),
                                    ElementDef::uint(0x63C5, "track_uid").multiple(),
                                ],
                            ),
                            ElementDef::container(
                                0x67C8,
                                "simple_tag",
                                [
                                    ElementDef::string(0x45A3, "name"),
                                    ElementDef::string(0x447A, "language"),
                                    ElementDef::bool(0x4484, "default"),
                                    ElementDef::string(0x4487, "string"),
                                    ElementDef::binary(0x4485, "binary"),
                                ],
                            )
                            .multiple(),
                        ],
                    )
                    .multiple()],
                )
                .multiple(),
            ],
        ),
    ])
}

fn track_entry() -> Vec<ElementDef> {
    vec![
        ElementDef::uint(0xD7, "number"),
        ElementDef::uint(0x73C5, "uid"),
        ElementDef::uint(0x83, "type"),
        ElementDef::bool(0xB9, "flag_enabled"),
        ElementDef::bool(0x88, "flag_default"),
        ElementDef::bool(0x55AA, "flag_forced"),
        ElementDef::bool(0x9C, "flag_lacing"),
        ElementDef::uint(0x23E383, "default_duration"),
        ElementDef::string(0x536E, "name"),
        ElementDef::string(0x22B59C, "language"),
        ElementDef::string(0x86, "codec_id"),
        ElementDef::binary(0x63A2, "codec_private"),
        ElementDef::string(0x258688, "codec_name"),
        ElementDef::uint(0x56AA, "codec_delay"),
        ElementDef::uint(0x56BB, "seek_pre_roll"),
        ElementDef::container(
            0xE0,
            "video",
            [
                ElementDef::uint(0x9A, "flag_interlaced"),
                ElementDef::uint(0xB0, "pixel_width"),
                ElementDef::uint(0xBA, "pixel_height"),
                ElementDef::uint(0x54B0, "display_width"),
                ElementDef::uint(0x54BA, "display_height"),
            ],
        ),
        ElementDef::container(
            0xE1,
            "audio",
            [
                ElementDef::float(0xB5, "sampling_frequency"),
                ElementDef::float(0x78B5, "output_sampling_frequency"),
                ElementDef::uint(0x9F, "channels"),
                ElementDef::uint(0x6264, "bit_depth"),
            ],
        ),
    ]
}

/// Links [`dtd`].
pub fn schema() -> Result<Schema> {
    Schema::link(&dtd())
}

/// Reads the EBML header with the default element widths, checks the document
/// type, applies the header's widths to `walker` and walks the rest of the
/// file.
///
/// The returned tree holds the header under `ebml` next to the top-level
/// elements that follow it. When the listener terminates the walk inside the
/// header, only the partial header is returned and nothing after it is read.
pub fn read_document<S, L>(
    walker: &mut Walker<'_>,
    source: &mut S,
    listener: &mut L,
) -> Result<ParseTree>
where
    S: ByteSource,
    L: Listener,
{
    walker.reset();

    let root = walker.schema().root();
    let ebml_node = root
        .child(ids::EBML)
        .ok_or_else(|| anyhow!(MatroskaError::MissingEbmlHeader))?;

    let header = ElementHeader::read(source, DEFAULT_MAX_ID_WIDTH, DEFAULT_MAX_SIZE_WIDTH)?
        .filter(|header| header.id == ids::EBML)
        .ok_or_else(|| anyhow!(MatroskaError::MissingEbmlHeader))?;
    let Some(end) = header.end() else {
        bail!(WalkError::UnboundedElement {
            id: header.id,
            offset: header.offset,
        });
    };

    let ebml = walker.walk_container(source, ebml_node, Some(end), listener)?;
    if walker.terminated() {
        let mut tree = ParseTree::new();
        tree.store(ebml_node.name(), ebml_node.multiple(), Value::Tree(ebml));
        return Ok(tree);
    }

    let doc_type = ebml.get_as::<String>("doc_type");
    let doc_type = doc_type.as_deref().unwrap_or(DOC_TYPES[0]);
    if !DOC_TYPES.contains(&doc_type) {
        bail!(MatroskaError::UnsupportedDocType(doc_type.to_owned()));
    }
    walker.configure_from_header(&ebml)?;

    let ebml = Value::Tree(ebml);
    listener.on_value(ebml_node, &ebml, header.offset)?;

    let mut tree = walker.walk_container(source, root, None, listener)?;
    tree.store(ebml_node.name(), ebml_node.multiple(), ebml);

    Ok(tree)
}

/// Metadata-only listener.
///
/// Media data (`cluster`), the cue index, attachment bodies and codec private
/// data are skipped unread. Completed `info`, `track_entry` and `tag` levels
/// are kept as they are produced, so they survive a walk that fails later on.
#[derive(Debug, Default)]
pub struct MatroskaListener {
    pub info: Option<ParseTree>,
    pub tracks: Vec<ParseTree>,
    pub tags: Vec<ParseTree>,
}

impl Listener for MatroskaListener {
    fn decide(&mut self, node: NodeRef<'_>) -> Action {
        match node.name() {
            "cluster" | "cues" | "attachments" | "codec_private" => Action::IgnoreElement,
            _ => Action::ReadNext,
        }
    }

    fn on_value(&mut self, node: NodeRef<'_>, value: &Value, offset: u64) -> Result<()> {
        let Some(tree) = value.as_tree() else {
            return Ok(());
        };
        let parent = node.parent().map(|parent| parent.name());

        match (parent, node.name()) {
            (Some("segment"), "info") => self.info = Some(tree.clone()),
            (Some("tracks"), "track_entry") => self.tracks.push(tree.clone()),
            (Some("tags"), "tag") => self.tags.push(tree.clone()),
            _ => return Ok(()),
        }
        debug!("Recorded {node} at {offset}");

        Ok(())
    }
}

/// Walk settings for [`MatroskaMetadata::read`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    pub fail_level: log::Level,
    pub max_depth: usize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            fail_level: log::Level::Error,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Video,
    Audio,
    Subtitle,
    Other(u64),
}

impl TrackKind {
    pub fn from_type(track_type: u64) -> Self {
        match track_type {
            1 => Self::Video,
            2 => Self::Audio,
            17 => Self::Subtitle,
            other => Self::Other(other),
        }
    }
}

impl Display for TrackKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Video => f.write_str("video"),
            Self::Audio => f.write_str("audio"),
            Self::Subtitle => f.write_str("subtitle"),
            Self::Other(t) => write!(f, "other({t})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackInfo {
    pub number: Option<u64>,
    pub kind: TrackKind,
    pub codec: Option<String>,
    pub name: Option<String>,
    pub language: Option<String>,
    pub sample_rate: Option<f64>,
    pub channels: Option<u64>,
    pub bit_depth: Option<u64>,
    pub width: Option<u64>,
    pub height: Option<u64>,
}

impl TrackInfo {
    fn from_entry(entry: &ParseTree) -> Self {
        Self {
            number: entry.get_as("number"),
            kind: TrackKind::from_type(entry.get_as("type").unwrap_or(0)),
            codec: entry.get_as("codec_id"),
            name: entry.get_as("name"),
            language: entry.get_as("language"),
            sample_rate: entry.get_as("audio/sampling_frequency"),
            channels: entry.get_as("audio/channels"),
            bit_depth: entry.get_as("audio/bit_depth"),
            width: entry.get_as("video/pixel_width"),
            height: entry.get_as("video/pixel_height"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TagInfo {
    pub target_type: Option<String>,
    pub name: String,
    pub value: Option<String>,
    pub language: Option<String>,
}

/// Flat description of a Matroska or WebM file.
#[derive(Debug, Clone, PartialEq)]
pub struct MatroskaMetadata {
    pub doc_type: String,
    pub doc_type_version: Option<u64>,
    pub title: Option<String>,
    pub duration_seconds: Option<f64>,
    /// Nanoseconds since 2001-01-01T00:00:00 UTC.
    pub date_utc: Option<i64>,
    pub muxing_app: Option<String>,
    pub writing_app: Option<String>,
    pub tracks: Vec<TrackInfo>,
    pub tags: Vec<TagInfo>,

    /// Bytes of unknown and void elements skipped.
    pub padding: u64,
    pub bound_violations: usize,
}

impl MatroskaMetadata {
    pub fn read<S: ByteSource>(source: &mut S, schema: &Schema, options: &ReadOptions) -> Result<Self> {
        let mut walker = Walker::new(schema);
        walker.set_fail_level(options.fail_level);
        walker.set_max_depth(options.max_depth);

        let mut listener = MatroskaListener::default();
        let tree = read_document(&mut walker, source, &mut listener)?;

        let metadata = Self::from_document(&tree, &listener, &walker);
        info!(
            "{} document: {} tracks, {} tags, {} bytes of padding",
            metadata.doc_type,
            metadata.tracks.len(),
            metadata.tags.len(),
            metadata.padding
        );

        Ok(metadata)
    }

    /// Maps a document read by [`read_document`] with a [`MatroskaListener`].
    pub fn from_document(tree: &ParseTree, listener: &MatroskaListener, walker: &Walker<'_>) -> Self {
        let empty = ParseTree::new();
        let info = listener.info.as_ref().unwrap_or(&empty);

        let timecode_scale: u64 = info
            .get_as("timecode_scale")
            .unwrap_or(DEFAULT_TIMECODE_SCALE);
        let duration_seconds = info
            .get_as::<f64>("duration")
            .map(|ticks| ticks * timecode_scale as f64 / 1e9);

        let tags = listener
            .tags
            .iter()
            .flat_map(|tag| {
                let target_type: Option<String> = tag.get_as("targets/target_type");
                tag.get("simple_tag")
                    .map(Value::items)
                    .unwrap_or_default()
                    .iter()
                    .filter_map(Value::as_tree)
                    .filter_map(move |simple| {
                        Some(TagInfo {
                            target_type: target_type.clone(),
                            name: simple.get_as("name")?,
                            value: simple.get_as("string"),
                            language: simple.get_as("language"),
                        })
                    })
            })
            .collect();

        Self {
            doc_type: tree
                .get_as("ebml/doc_type")
                .unwrap_or_else(|| DOC_TYPES[0].to_owned()),
            doc_type_version: tree.get_as("ebml/doc_type_version"),
            title: info.get_as("title"),
            duration_seconds,
            date_utc: info.get_as("date_utc"),
            muxing_app: info.get_as("muxing_app"),
            writing_app: info.get_as("writing_app"),
            tracks: listener.tracks.iter().map(TrackInfo::from_entry).collect(),
            tags,
            padding: walker.padding(),
            bound_violations: walker.bound_violations(),
        }
    }
}
