use std::path::Path;

use anyhow::{Context, Result};
use ebmltree::process::walk::Walker;
use ebmltree::structs::matroska::{self, MatroskaListener, MatroskaMetadata};
use ebmltree::structs::schema::Schema;
use ebmltree::structs::tree::{FromTree, ParseTree, Value};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use mkvprobe_macros::FromTree;

use super::command::{Cli, InfoArgs};
use super::hex_preview;
use crate::input::InputReader;
use crate::timestamp::{date_str, time_str};

#[derive(Debug, Default, FromTree)]
struct EbmlHeader {
    version: Option<u64>,
    read_version: Option<u64>,
    doc_type_version: Option<u64>,
    doc_type_read_version: Option<u64>,
}

#[derive(Debug, Default, FromTree)]
struct SegmentDetails {
    #[tree(rename = "segment_uid")]
    uid: Option<Vec<u8>>,
    date_utc: Option<i64>,
}

#[derive(Debug, Default, FromTree)]
struct TrackDetails {
    uid: Option<u64>,
    codec_name: Option<String>,
    flag_default: Option<bool>,
    flag_forced: Option<bool>,
    default_duration: Option<u64>,
}

#[derive(Debug, Default, FromTree)]
struct TagTargets {
    target_type_value: Option<u64>,
    target_type: Option<String>,
    #[tree(list)]
    track_uid: Vec<u64>,
}

#[derive(Debug, Default, FromTree)]
struct TagDetails {
    targets: Option<TagTargets>,
}

pub fn cmd_info(args: &InfoArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    let schema = matroska::schema()?;

    let pb = match multi {
        Some(multi) => {
            let pb = multi.add(ProgressBar::new(args.inputs.len() as u64));
            pb.set_style(ProgressStyle::with_template(
                "{bar:40.cyan/blue} {pos}/{len} files | {msg}",
            )?);
            Some(pb)
        }
        None => None,
    };

    let mut failed = 0usize;
    for input in &args.inputs {
        if let Some(ref pb) = pb {
            pb.set_message(input.display().to_string());
        }

        match analyze_file(input, &schema, cli) {
            Ok(report) => match pb {
                Some(ref pb) => pb.suspend(|| report.display()),
                None => report.display(),
            },
            Err(e) => {
                if cli.strict {
                    return Err(e);
                }
                log::error!("{e:#}");
                failed += 1;
            }
        }

        if let Some(ref pb) = pb {
            pb.inc(1);
        }
    }

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} inputs could not be read", args.inputs.len());
    }

    Ok(())
}

struct Report {
    name: String,
    size: u64,
    metadata: MatroskaMetadata,
    header: EbmlHeader,
    segment: SegmentDetails,
    tracks: Vec<TrackDetails>,
    tags: Vec<TagDetails>,
}

fn analyze_file(path: &Path, schema: &Schema, cli: &Cli) -> Result<Report> {
    log::info!("Analyzing {}", path.display());

    let mut input =
        InputReader::new(path).with_context(|| format!("Failed to open {}", path.display()))?;

    let mut walker = Walker::new(schema);
    walker.set_fail_level(cli.fail_level());
    walker.set_max_depth(cli.max_depth);

    let mut listener = MatroskaListener::default();
    let tree = matroska::read_document(&mut walker, &mut input, &mut listener)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let metadata = MatroskaMetadata::from_document(&tree, &listener, &walker);
    let empty = ParseTree::new();

    Ok(Report {
        name: if input.is_pipe() {
            "<stdin>".to_owned()
        } else {
            path.display().to_string()
        },
        size: input.len(),
        metadata,
        header: tree
            .get("ebml")
            .and_then(Value::as_tree)
            .map(EbmlHeader::from_tree)
            .unwrap_or_default(),
        segment: SegmentDetails::from_tree(listener.info.as_ref().unwrap_or(&empty)),
        tracks: listener.tracks.iter().map(TrackDetails::from_tree).collect(),
        tags: listener.tags.iter().map(TagDetails::from_tree).collect(),
    })
}

impl Report {
    fn display(&self) {
        let meta = &self.metadata;

        println!();
        println!("{}", self.name);
        println!("{}", "=".repeat(self.name.chars().count()));
        println!();

        println!("Document");
        print!("  Type                      {}", meta.doc_type);
        if let Some(version) = self.header.doc_type_version {
            print!(" v{version}");
        }
        if let Some(read_version) = self.header.doc_type_read_version {
            print!(" (readable by v{read_version})");
        }
        println!();
        if let (Some(version), Some(read_version)) = (self.header.version, self.header.read_version)
        {
            println!("  EBML version              {version} (read {read_version})");
        }
        println!("  Size                      {} bytes", self.size);
        println!();

        println!("Segment");
        if let Some(title) = &meta.title {
            println!("  Title                     {title}");
        }
        if let Some(duration) = meta.duration_seconds {
            println!("  Duration                  {}", time_str(duration));
        }
        if let Some(date) = self.segment.date_utc {
            println!("  Date                      {}", date_str(date));
        }
        if let Some(uid) = &self.segment.uid {
            println!("  UID                       {}", hex_preview(uid));
        }
        if let Some(app) = &meta.muxing_app {
            println!("  Muxing application        {app}");
        }
        if let Some(app) = &meta.writing_app {
            println!("  Writing application       {app}");
        }
        println!();

        for (track, details) in meta.tracks.iter().zip(&self.tracks) {
            let number = track.number.map_or("?".to_owned(), |n| n.to_string());
            println!("Track {number} ({})", track.kind);
            if let Some(codec) = &track.codec {
                match &details.codec_name {
                    Some(name) => println!("  Codec                     {codec} ({name})"),
                    None => println!("  Codec                     {codec}"),
                }
            }
            if let Some(name) = &track.name {
                println!("  Name                      {name}");
            }
            if let Some(language) = &track.language {
                println!("  Language                  {language}");
            }
            if let Some(rate) = track.sample_rate {
                println!("  Sampling rate             {rate} Hz");
            }
            if let Some(channels) = track.channels {
                println!("  Channels                  {channels}");
            }
            if let Some(bits) = track.bit_depth {
                println!("  Bit depth                 {bits}");
            }
            if let (Some(width), Some(height)) = (track.width, track.height) {
                println!("  Resolution                {width}x{height}");
            }
            if let Some(ns) = details.default_duration {
                println!("  Frame duration            {:.3} ms", ns as f64 / 1e6);
            }
            println!(
                "  Default / forced          {} / {}",
                details.flag_default.unwrap_or(true),
                details.flag_forced.unwrap_or(false)
            );
            if let Some(uid) = details.uid {
                println!("  UID                       {uid}");
            }
            println!();
        }

        if !meta.tags.is_empty() {
            println!("Tags");
            for tag in &meta.tags {
                let target = tag.target_type.as_deref().unwrap_or("-");
                let value = tag.value.as_deref().unwrap_or("");
                match &tag.language {
                    Some(language) => {
                        println!("  [{target}] {} ({language}) = {value}", tag.name)
                    }
                    None => println!("  [{target}] {} = {value}", tag.name),
                }
            }
            for targets in self.tags.iter().filter_map(|tag| tag.targets.as_ref()) {
                if targets.track_uid.is_empty() {
                    continue;
                }
                let uids: Vec<String> = targets.track_uid.iter().map(u64::to_string).collect();
                println!(
                    "  {} (level {}) applies to tracks {}",
                    targets.target_type.as_deref().unwrap_or("-"),
                    targets.target_type_value.unwrap_or(50),
                    uids.join(", ")
                );
            }
            println!();
        }

        println!("Walk Summary");
        println!("  Padding                   {} bytes", meta.padding);
        println!("  Bound violations          {}", meta.bound_violations);
        println!();
    }
}
