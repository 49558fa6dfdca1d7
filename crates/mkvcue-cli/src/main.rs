//! mkvcue - Inspect Matroska files and pull subtitles and attachments out
//!
//! Reads the seek table, track list and cue index of one file or a whole
//! directory tree, extracts subtitle captions cue span by cue span and
//! writes attached files (fonts, covers) to disk.

use anyhow::{bail, ensure, Context, Result};
use clap::{Args, Parser, ValueEnum};
use mkvcue_core::{
    ElementParser, MatroskaReader, ParseFilter, ReaderConfig, Region, Schema, Timestamp,
};
use std::collections::HashMap;
use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, trace, warn, Level};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Extensions picked up when walking a directory
const MATROSKA_EXTENSIONS: [&str; 5] = ["mkv", "mka", "mks", "mk3d", "webm"];

/// First four bytes of every EBML document
const EBML_MAGIC: [u8; 4] = [0x1A, 0x45, 0xDF, 0xA3];

/// Inspect Matroska files and pull subtitles and attachments out of them
#[derive(Parser, Debug)]
#[command(name = "mkvcue")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    input: InputMode,

    /// Where attachments are written
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Increase log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print the cue table
    #[arg(long)]
    cues: bool,

    /// Extract every cue span and print the captions found
    #[arg(long)]
    subtitles: bool,

    /// Write attached files into the output directory
    #[arg(long)]
    attachments: bool,

    /// Print the element tree of a top-level region
    #[arg(long, value_enum)]
    dump: Option<DumpRegion>,

    /// Track whose cues drive the cue index (default: first video track)
    #[arg(long)]
    primary_track: Option<u64>,

    /// Bytes after the segment header searched for the seek head
    #[arg(long, default_value_t = mkvcue_core::reader::DEFAULT_SEEK_HEAD_SCAN_WINDOW)]
    scan_window: usize,

    /// Ignore a second seek head listed by the first one
    #[arg(long)]
    no_secondary_seek_head: bool,

    /// Report where attachments would go without writing them
    #[arg(long)]
    dry_run: bool,

    /// Replace attachments that already exist in the output directory
    #[arg(long)]
    force: bool,

    /// List attachments with their size and type only
    #[arg(long)]
    list_only: bool,

    /// What to do when two attachments share a name but not their content
    #[arg(long, value_enum, default_value = "hash-suffix")]
    conflict_strategy: ConflictStrategy,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct InputMode {
    /// A single Matroska file
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// A directory searched recursively for Matroska files
    #[arg(short, long)]
    directory: Option<PathBuf>,
}

/// Regions whose element tree can be dumped
#[derive(Debug, Clone, Copy, ValueEnum)]
enum DumpRegion {
    /// Segment information
    Info,
    /// Track list
    Tracks,
    /// Cue index
    Cues,
    /// Attached files
    Attachments,
}

impl From<DumpRegion> for Region {
    fn from(region: DumpRegion) -> Self {
        match region {
            DumpRegion::Info => Region::Info,
            DumpRegion::Tracks => Region::Tracks,
            DumpRegion::Cues => Region::Cues,
            DumpRegion::Attachments => Region::Attachments,
        }
    }
}

/// Naming policy for same-name attachments with different content
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ConflictStrategy {
    /// Insert a short content digest: font~a1b2c3d4.ttf
    HashSuffix,
    /// Insert the name of the file it came from: font~from-movie.ttf
    SourceSuffix,
    /// Keep only the first attachment of a name
    SkipConflicts,
}

/// Where an attachment ends up
#[derive(Debug, Clone, PartialEq, Eq)]
enum Placement {
    /// First attachment of this name
    Fresh(PathBuf),
    /// Same name as an earlier one, different content
    Renamed(PathBuf),
    /// Same name and content as an earlier one
    Duplicate,
    /// Name conflict under [`ConflictStrategy::SkipConflicts`]
    Dropped,
}

impl Placement {
    fn destination(&self) -> Option<&Path> {
        match self {
            Placement::Fresh(path) | Placement::Renamed(path) => Some(path),
            Placement::Duplicate | Placement::Dropped => None,
        }
    }
}

/// Attachments placed so far, across every input file
#[derive(Debug, Default)]
struct AttachmentStore {
    /// Attachment name -> (content digest, destination) per variant
    variants: HashMap<String, Vec<(String, PathBuf)>>,
    counts: StoreCounts,
}

#[derive(Debug, Default)]
struct StoreCounts {
    seen: usize,
    duplicates: usize,
    renamed: usize,
    dropped: usize,
    written: usize,
}

impl AttachmentStore {
    /// First eight hex digits of the blake3 digest
    fn digest(data: &[u8]) -> String {
        let hex = blake3::hash(data).to_hex();
        hex[..8].to_owned()
    }

    /// Inserts `suffix` between the stem and the extension of `name`
    fn suffixed(name: &str, suffix: &str) -> String {
        match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => format!("{stem}{suffix}.{ext}"),
            _ => format!("{name}{suffix}"),
        }
    }

    /// Decides where an attachment goes and records it
    fn place(
        &mut self,
        name: &str,
        digest: &str,
        output_dir: &Path,
        source: &Path,
        strategy: ConflictStrategy,
    ) -> Placement {
        self.counts.seen += 1;
        let variants = self.variants.entry(name.to_owned()).or_default();

        if variants.iter().any(|(known, _)| known == digest) {
            debug!("{} with digest {} already placed", name, digest);
            self.counts.duplicates += 1;
            return Placement::Duplicate;
        }

        let placement = if variants.is_empty() {
            Placement::Fresh(output_dir.join(name))
        } else {
            let suffix = match strategy {
                ConflictStrategy::SkipConflicts => {
                    debug!("Dropping {} from {}: name taken", name, source.display());
                    self.counts.dropped += 1;
                    return Placement::Dropped;
                }
                ConflictStrategy::HashSuffix => format!("~{digest}"),
                ConflictStrategy::SourceSuffix => {
                    let stem = source
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .unwrap_or("unknown");
                    format!("~from-{stem}")
                }
            };
            let renamed = Self::suffixed(name, &suffix);
            info!("{} differs from an earlier copy, placing it as {}", name, renamed);
            self.counts.renamed += 1;
            Placement::Renamed(output_dir.join(renamed))
        };

        if let Some(destination) = placement.destination() {
            variants.push((digest.to_owned(), destination.to_path_buf()));
        }
        placement
    }

    fn report(&self) {
        let c = &self.counts;
        info!(
            "Attachments: {} seen, {} written, {} renamed, {} duplicates, {} dropped",
            c.seen, c.written, c.renamed, c.duplicates, c.dropped
        );
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .init();

    let inputs = collect_inputs(&cli.input)?;
    let walking = cli.input.directory.is_some();
    let mut store = AttachmentStore::default();

    for path in &inputs {
        match process_file(&cli, path, &mut store) {
            Ok(()) => {}
            // One bad file does not stop a directory walk
            Err(e) if walking => warn!("Skipping {}: {:#}", path.display(), e),
            Err(e) => return Err(e),
        }
    }
    info!("Processed {} file(s)", inputs.len());

    if cli.attachments && !cli.list_only && !cli.dry_run {
        store.report();
    }
    Ok(())
}

/// Resolves the input flags into the list of files to open
fn collect_inputs(input: &InputMode) -> Result<Vec<PathBuf>> {
    match (&input.file, &input.directory) {
        (Some(file), _) => {
            ensure!(file.is_file(), "Not a readable file: {}", file.display());
            Ok(vec![file.clone()])
        }
        (None, Some(directory)) => {
            ensure!(directory.is_dir(), "Not a directory: {}", directory.display());
            info!("Walking {}", directory.display());
            let found: Vec<PathBuf> = WalkDir::new(directory)
                .follow_links(false)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .map(walkdir::DirEntry::into_path)
                .filter(|path| !is_hidden(path))
                .filter(|path| {
                    let keep = is_likely_matroska(path);
                    if !keep {
                        trace!("Not Matroska: {}", path.display());
                    }
                    keep
                })
                .collect();
            Ok(found)
        }
        (None, None) => bail!("Pass --file or --directory"),
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map_or(false, |n| n.starts_with('.'))
}

/// Known extension, or the EBML magic for files without one
fn is_likely_matroska(path: &Path) -> bool {
    let by_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .map_or(false, |ext| MATROSKA_EXTENSIONS.contains(&ext.as_str()));
    if by_extension {
        return true;
    }

    let mut magic = [0u8; 4];
    fs::File::open(path)
        .and_then(|mut file| file.read_exact(&mut magic))
        .map_or(false, |()| magic == EBML_MAGIC)
}

fn reader_config(cli: &Cli) -> ReaderConfig {
    let config = ReaderConfig::new()
        .seek_head_scan_window(cli.scan_window)
        .follow_secondary_seek_head(!cli.no_secondary_seek_head);
    match cli.primary_track {
        Some(track) => config.primary_track(track),
        None => config,
    }
}

/// Runs every requested action on one file
fn process_file(cli: &Cli, path: &Path, store: &mut AttachmentStore) -> Result<()> {
    debug!("Opening {}", path.display());
    let mut reader = MatroskaReader::open_with_config(path, reader_config(cli))
        .with_context(|| format!("Cannot open {}", path.display()))?;
    reader
        .read_tracks()
        .with_context(|| format!("Cannot read the track list of {}", path.display()))?;

    print_summary(path, &reader);

    if let Some(region) = cli.dump {
        dump_region(&mut reader, region.into())?;
    }

    if cli.cues || cli.subtitles {
        if let Err(e) = reader.read_cues() {
            if !e.is_recoverable() {
                return Err(e)
                    .with_context(|| format!("Cannot build the cue index of {}", path.display()));
            }
            warn!("{}: {}", path.display(), e);
        }
    }

    if cli.cues {
        print_cues(&reader);
    }
    if cli.subtitles {
        print_captions(&mut reader)?;
    }
    if cli.attachments {
        save_attachments(cli, path, &mut reader, store)?;
    }
    Ok(())
}

fn print_summary<R: Read + Seek>(path: &Path, reader: &MatroskaReader<R>) {
    let info = reader.info();
    println!("{}", path.display());
    println!("  doc type   {}", reader.locator().doc_type());
    if let Some(title) = &info.title {
        println!("  title      {}", title);
    }
    println!("  duration   {}", Timestamp(info.duration_ms() as i64));

    for track in reader.tracks() {
        println!(
            "  #{:<3} {:<9} {:<18} {:<4} {}",
            track.number,
            track.track_type.to_string(),
            track.codec_id,
            track.language,
            track.name.as_deref().unwrap_or("")
        );
    }
    for audio in reader.audio_tracks() {
        println!(
            "  #{:<3} {} {}",
            audio.entry.number,
            audio.codec,
            audio.channel_layout()
        );
    }
}

fn print_cues<R: Read + Seek>(reader: &MatroskaReader<R>) {
    let Ok(index) = reader.cue_index() else {
        return;
    };
    println!(
        "  {} cue spans, direct subtitle positions: {}",
        index.len(),
        if index.has_direct_subtitle_positions() { "yes" } else { "no" }
    );
    for (i, entry) in index.entries().iter().enumerate() {
        println!(
            "  {:>5}  [{:>10}, {:>10})  bytes {:>12}..={:<12} {} direct",
            i,
            entry.timecode(),
            entry.next_timecode(),
            entry.start_address(),
            entry.end_address(),
            entry.sub_entries().map_or(0, <[_]>::len)
        );
    }
}

/// Extracts every cue span and prints the captions, in track order
fn print_captions<R: Read + Seek>(reader: &mut MatroskaReader<R>) -> Result<()> {
    if reader.subtitles().is_empty() {
        info!("No subtitle tracks");
        return Ok(());
    }

    for index in 0..reader.cue_count() {
        if reader.can_extract(index) {
            reader
                .extract(index)
                .with_context(|| format!("Extraction of cue span {} failed", index))?;
        }
    }

    let drained: Vec<_> = reader
        .subtitles_mut()
        .iter_mut()
        .flat_map(|track| {
            let number = track.track_number();
            track
                .take_unread()
                .into_iter()
                .map(move |caption| (number, caption))
        })
        .collect();

    for (number, caption) in drained {
        let payload = reader.read_span(caption.block.payload())?;
        let text = if caption.compressed {
            format!("<zlib, {} bytes>", payload.len())
        } else {
            String::from_utf8_lossy(&payload).replace('\n', "\\n")
        };
        println!("  [{}] {} --> {}  {}", number, caption.start, caption.end, text);
    }
    Ok(())
}

fn save_attachments<R: Read + Seek>(
    cli: &Cli,
    source: &Path,
    reader: &mut MatroskaReader<R>,
    store: &mut AttachmentStore,
) -> Result<()> {
    reader
        .read_attachments()
        .with_context(|| format!("Cannot read the attachments of {}", source.display()))?;

    for attachment in reader.attachments().to_vec() {
        if cli.list_only {
            println!(
                "  {:<32} {:<24} {:>10} bytes",
                attachment.name,
                attachment.mime_type,
                attachment.size()
            );
            continue;
        }

        let data = reader.read_span(attachment.data)?;
        let name = safe_file_name(&attachment.name);
        let placement = store.place(
            &name,
            &AttachmentStore::digest(&data),
            &cli.output,
            source,
            cli.conflict_strategy,
        );
        let Some(destination) = placement.destination() else {
            continue;
        };

        if cli.dry_run {
            println!("  would write {}", destination.display());
            continue;
        }
        match write_attachment(destination, &data, cli.force) {
            Ok(()) => {
                println!("  wrote {}", destination.display());
                store.counts.written += 1;
            }
            Err(e) => error!("{:#}", e),
        }
    }
    Ok(())
}

/// Parses a top-level region and prints its element tree
fn dump_region<R: Read + Seek>(reader: &mut MatroskaReader<R>, region: Region) -> Result<()> {
    let offset = reader.region_offset(region);
    if offset == 0 {
        println!("  {} is not listed in the seek table", region);
        return Ok(());
    }

    let schema = Schema::global();
    let node = match region {
        Region::Info => schema.info(),
        Region::Tracks => schema.tracks(),
        Region::Cues => schema.cues(),
        Region::Attachments => schema.attachments(),
        other => bail!("{} cannot be dumped", other),
    };

    let handle = reader.get_mut();
    handle.seek(SeekFrom::Start(offset))?;
    let element = ElementParser::new(node)
        .parse(handle, ParseFilter::none())?
        .with_context(|| format!("No {} element at offset {}", region, offset))?;

    let mut tree = String::new();
    element.dump(&mut tree)?;
    print!("{}", tree);
    Ok(())
}

/// Keeps only the final path component of an attachment name
fn safe_file_name(name: &str) -> String {
    match name.rsplit(['/', '\\']).next() {
        None | Some("" | "." | "..") => "attachment.bin".to_owned(),
        Some(base) => base.to_owned(),
    }
}

/// Writes `data`, failing on an existing file unless `force` is set
fn write_attachment(path: &Path, data: &[u8], force: bool) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("Cannot create {}", dir.display()))?;
    }

    let mut options = fs::OpenOptions::new();
    options.write(true);
    if force {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }
    let mut file = options.open(path).with_context(|| {
        format!(
            "Cannot create {} (use --force to replace existing files)",
            path.display()
        )
    })?;
    file.write_all(data)
        .with_context(|| format!("Cannot write {}", path.display()))
}
