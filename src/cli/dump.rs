use std::io::{self, Write};

use anyhow::{Context, Result};
use ebmltree::process::listener::{Action, Listener};
use ebmltree::process::walk::Walker;
use ebmltree::structs::matroska;
use ebmltree::structs::schema::NodeRef;
use ebmltree::structs::tree::{ParseTree, Value};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use super::command::{Cli, DumpArgs, DumpFormat};
use super::hex_preview;
use crate::input::InputReader;
use crate::timestamp::date_str;

pub fn cmd_dump(args: &DumpArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    log::info!("Dumping {}", args.input.display());

    let schema = matroska::schema()?;
    let mut input = InputReader::new(&args.input)
        .with_context(|| format!("Failed to open {}", args.input.display()))?;

    let mut walker = Walker::new(&schema);
    walker.set_fail_level(cli.fail_level());
    walker.set_max_depth(cli.max_depth);

    let pb = match multi {
        Some(multi) => {
            let pb = multi.add(ProgressBar::new_spinner());
            pb.set_style(ProgressStyle::with_template(
                "{spinner:.green} {pos} values | elapsed: {elapsed_precise}",
            )?);
            pb.enable_steady_tick(std::time::Duration::from_millis(100));
            Some(pb)
        }
        None => None,
    };

    let stdout = io::stdout();
    let mut listener = DumpListener {
        clusters: args.clusters,
        lines: (args.format == DumpFormat::JsonLines).then(|| stdout.lock()),
        pb: pb.clone(),
    };

    let tree = matroska::read_document(&mut walker, &mut input, &mut listener)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    log::info!(
        "{} bytes of padding, {} bound violations",
        walker.padding(),
        walker.bound_violations()
    );

    if args.format == DumpFormat::Yaml {
        let yaml = serde_yaml_ng::to_string(&TreeRef(&tree))?;
        let mut out = stdout.lock();
        out.write_all(yaml.as_bytes())?;
        out.flush()?;
    }

    Ok(())
}

/// Reads everything except media data unless asked to, and streams values as
/// JSON lines when `lines` is set.
struct DumpListener<W: Write> {
    clusters: bool,
    lines: Option<W>,
    pb: Option<ProgressBar>,
}

impl<W: Write> Listener for DumpListener<W> {
    fn decide(&mut self, node: NodeRef<'_>) -> Action {
        if node.name() == "cluster" && !self.clusters {
            return Action::IgnoreElement;
        }
        Action::ReadNext
    }

    fn on_value(&mut self, node: NodeRef<'_>, value: &Value, offset: u64) -> Result<()> {
        if let Some(ref pb) = self.pb {
            pb.inc(1);
        }

        let Some(out) = self.lines.as_mut() else {
            return Ok(());
        };

        let line = serde_json::to_string(&Event::new(node, value, offset))?;
        match self.pb {
            Some(ref pb) => pb.suspend(|| writeln!(out, "{line}"))?,
            None => writeln!(out, "{line}")?,
        }

        Ok(())
    }
}

/// One decoded value. Completed containers report their entry count instead
/// of repeating their children.
#[derive(Serialize)]
struct Event<'a> {
    offset: u64,
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<ValueRef<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    entries: Option<usize>,
}

impl<'a> Event<'a> {
    fn new(node: NodeRef<'_>, value: &'a Value, offset: u64) -> Self {
        let (value, entries) = match value {
            Value::Tree(tree) => (None, Some(tree.len())),
            other => (Some(ValueRef(other)), None),
        };

        Self {
            offset,
            path: node.path(),
            value,
            entries,
        }
    }
}

/// Serializes a parse tree level as a map keyed by element name.
pub struct TreeRef<'a>(pub &'a ParseTree);

impl Serialize for TreeRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in self.0.iter() {
            map.serialize_entry(name, &ValueRef(value))?;
        }
        map.end()
    }
}

/// Serializes one value. Dates become UTC strings, binary data hex strings.
pub struct ValueRef<'a>(pub &'a Value);

impl Serialize for ValueRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Value::Uint(v) => serializer.serialize_u64(*v),
            Value::Int(v) => serializer.serialize_i64(*v),
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::Str(s) => serializer.serialize_str(s),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Date(ns) => serializer.serialize_str(&date_str(*ns)),
            Value::Binary(bytes) | Value::Uid(bytes) => {
                serializer.serialize_str(&hex_preview(bytes))
            }
            Value::Tree(tree) => TreeRef(tree).serialize(serializer),
            Value::List(items) => serializer.collect_seq(items.iter().map(ValueRef)),
        }
    }
}
