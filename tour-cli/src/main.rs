//! WWT Tour CLI Tool
//!
//! Command-line interface for WorldWide Telescope tour archives (.wtt).

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tour_core::util::format_duration;
use tour_core::{
    EngineContext, FsFetcher, LoadOptions, LoadSummary, Place, SlideLink, TourDocument,
    TourProperties, TourStop,
};
use tour_editor::TourEditor;
use tour_player::{PlayerEvent, PlayerState, TourPlayer};

#[derive(Parser)]
#[command(name = "wwt-tour")]
#[command(about = "Inspect and build WorldWide Telescope tour archives")]
#[command(version)]
struct Cli {
    /// Log debug detail (RUST_LOG still takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show tour metadata and its stops
    Info {
        /// Tour archive path
        input: PathBuf,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,

        /// Fail on any malformed stop or truncated file
        #[arg(long)]
        strict: bool,
    },

    /// Check a tour for problems that would break playback
    Validate {
        /// Tour archive path
        input: PathBuf,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// List the files packed in a tour archive
    Files {
        /// Tour archive path
        input: PathBuf,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Unpack every file of a tour archive into a directory
    Extract {
        /// Tour archive path
        input: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Build a tour archive from a manifest and the media next to it
    Pack {
        /// Tour manifest (.wwtxml)
        manifest: PathBuf,

        /// Output archive path
        #[arg(short, long)]
        output: PathBuf,

        /// Directory holding referenced media (defaults to the manifest's)
        #[arg(long)]
        media_dir: Option<PathBuf>,

        /// Fail on any malformed stop
        #[arg(long)]
        strict: bool,
    },

    /// Create a new tour archive
    New {
        /// Output archive path
        output: PathBuf,

        /// Tour title
        #[arg(long)]
        title: String,

        /// Tour author
        #[arg(long, default_value = "")]
        author: String,

        /// Caption of a stop to add (repeatable)
        #[arg(long = "stop")]
        stops: Vec<String>,

        /// Image to place on the first stop and use as its thumbnail
        #[arg(long)]
        image: Option<PathBuf>,
    },

    /// Play a tour through and print when each stop is reached
    Timeline {
        /// Tour archive path
        input: PathBuf,

        /// Fail on any malformed stop or truncated file
        #[arg(long)]
        strict: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Info {
            input,
            json,
            strict,
        } => show_info(&input, json, strict)?,

        Commands::Validate { input, json } => validate_tour(&input, json)?,

        Commands::Files { input, json } => list_files(&input, json)?,

        Commands::Extract { input, output } => extract_tour(&input, &output)?,

        Commands::Pack {
            manifest,
            output,
            media_dir,
            strict,
        } => pack_tour(&manifest, &output, media_dir.as_deref(), strict)?,

        Commands::New {
            output,
            title,
            author,
            stops,
            image,
        } => new_tour(&output, &title, &author, &stops, image.as_deref())?,

        Commands::Timeline { input, strict } => print_timeline(&input, strict)?,
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn load_options(strict: bool) -> LoadOptions {
    if strict {
        LoadOptions::strict()
    } else {
        LoadOptions::default()
    }
}

fn load_tour(input: &Path, strict: bool, ctx: &mut EngineContext) -> Result<TourDocument> {
    let url = input.to_str().context("Invalid input path")?;
    TourDocument::load(url, &FsFetcher::new(), ctx, &load_options(strict))
        .with_context(|| format!("Failed to load tour {}", input.display()))
}

#[derive(Serialize)]
struct StopInfo<'a> {
    index: usize,
    id: &'a str,
    caption: &'a str,
    duration_ms: u64,
    transition: String,
    next_slide: &'a str,
    master_slide: bool,
    overlays: usize,
}

#[derive(Serialize)]
struct TourInfo<'a> {
    id: &'a str,
    properties: &'a TourProperties,
    run_time_ms: u64,
    summary: LoadSummary,
    stops: Vec<StopInfo<'a>>,
}

fn tour_info(doc: &TourDocument) -> TourInfo<'_> {
    let stops = doc
        .stops()
        .iter()
        .enumerate()
        .map(|(index, stop)| StopInfo {
            index,
            id: stop.id(),
            caption: stop.caption(),
            duration_ms: stop.duration_ms(),
            transition: stop.transition().to_string(),
            next_slide: stop.next_slide(),
            master_slide: stop.master_slide(),
            overlays: stop.overlays().len(),
        })
        .collect();
    TourInfo {
        id: doc.id(),
        properties: doc.properties(),
        run_time_ms: doc.run_time(),
        summary: doc.load_summary(),
        stops,
    }
}

fn show_info(input: &Path, json: bool, strict: bool) -> Result<()> {
    let mut ctx = EngineContext::new();
    let doc = load_tour(input, strict, &mut ctx)?;
    let info = tour_info(&doc);

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    let props = info.properties;
    println!("\n=== Tour Information ===");
    println!("Title: {}", props.title);
    println!("Author: {}", props.author);
    if !props.description.is_empty() {
        println!("Description: {}", props.description);
    }
    println!("Level: {}", props.user_level);
    println!("Id: {}", info.id);
    println!(
        "Run time: {} ({:.2} seconds)",
        format_duration(info.run_time_ms),
        info.run_time_ms as f64 / 1000.0
    );
    println!(
        "Stops: {} loaded, {} dropped",
        info.summary.stops_loaded, info.summary.stops_dropped
    );

    println!("\n=== Stops ===");
    for stop in &info.stops {
        println!(
            "  [{}] {:<24} {} {:<10} overlays={}{}",
            stop.index,
            stop.caption,
            format_duration(stop.duration_ms),
            stop.transition,
            stop.overlays,
            if stop.master_slide { " master" } else { "" }
        );
    }
    Ok(())
}

#[derive(Serialize, Default)]
struct ValidationReport {
    stops: usize,
    stops_dropped: usize,
    errors: Vec<String>,
    missing_files: Vec<String>,
    broken_links: Vec<String>,
}

impl ValidationReport {
    fn problem_count(&self) -> usize {
        self.stops_dropped + self.errors.len() + self.missing_files.len() + self.broken_links.len()
    }
}

fn validate_document(doc: &TourDocument) -> ValidationReport {
    let mut report = ValidationReport {
        stops: doc.tour_stop_count(),
        stops_dropped: doc.load_summary().stops_dropped,
        ..ValidationReport::default()
    };

    for (index, stop) in doc.stops().iter().enumerate() {
        for file in stop.referenced_files() {
            if doc.get_cached_blob(file).is_none()
                && !report.missing_files.iter().any(|f| f == file)
            {
                report.missing_files.push(file.to_string());
            }
        }

        if let SlideLink::Stop(id) = stop.next_link() {
            if doc.index_of(&id).is_none() {
                report
                    .broken_links
                    .push(format!("stop {} links to missing stop {}", index, id));
            }
        }
        for overlay in stop.overlays() {
            if let Some(SlideLink::Stop(id)) = overlay.link() {
                if doc.index_of(&id).is_none() {
                    report.broken_links.push(format!(
                        "overlay '{}' on stop {} links to missing stop {}",
                        overlay.name, index, id
                    ));
                }
            }
        }
    }
    report
}

fn validate_tour(input: &Path, json: bool) -> Result<()> {
    let mut ctx = EngineContext::new();
    let doc = load_tour(input, false, &mut ctx)?;
    let mut report = validate_document(&doc);
    report.errors = ctx.take_errors();

    if let Err(e) = load_tour(input, true, &mut EngineContext::new()) {
        report.errors.push(format!("{:#}", e));
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validating tour: {}", input.display());
        println!("Stops: {}", report.stops);
        if report.stops_dropped > 0 {
            println!("Dropped stops: {}", report.stops_dropped);
        }
        for error in &report.errors {
            println!("  error: {}", error);
        }
        for file in &report.missing_files {
            println!("  missing file: {}", file);
        }
        for link in &report.broken_links {
            println!("  broken link: {}", link);
        }
    }

    let problems = report.problem_count();
    if problems > 0 {
        bail!("{} problem(s) found in {}", problems, input.display());
    }
    if !json {
        println!("OK");
    }
    Ok(())
}

#[derive(Serialize)]
struct FileInfo<'a> {
    filename: &'a str,
    size: usize,
    offset: usize,
    mime_type: Option<&'static str>,
}

fn list_files(input: &Path, json: bool) -> Result<()> {
    let mut ctx = EngineContext::new();
    let doc = load_tour(input, false, &mut ctx)?;
    let fc = doc.cabinet().context("Tour has no archive")?;

    let files: Vec<FileInfo> = fc
        .entries()
        .iter()
        .map(|entry| FileInfo {
            filename: &entry.filename,
            size: entry.size,
            offset: entry.offset,
            mime_type: fc.get_file_blob(&entry.filename).and_then(|b| b.mime_type),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&files)?);
        return Ok(());
    }

    println!("Header size: {} bytes", fc.header_size());
    for file in &files {
        println!(
            "  {:>10} {:>10}  {}  {}",
            file.offset,
            file.size,
            file.filename,
            file.mime_type.unwrap_or("")
        );
    }
    let total: usize = files.iter().map(|f| f.size).sum();
    println!("{} files, {} bytes ({:.2} KB)", files.len(), total, total as f64 / 1024.0);
    Ok(())
}

/// Maps an archive file name (which may use `\` separators) to a path
/// inside `root`. Names that would escape `root` are rejected.
fn archive_path(root: &Path, filename: &str) -> Option<PathBuf> {
    let relative: PathBuf = filename.split(['\\', '/']).filter(|s| !s.is_empty()).collect();
    if relative.as_os_str().is_empty() {
        return None;
    }
    let safe = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    safe.then(|| root.join(relative))
}

fn extract_tour(input: &Path, output: &Path) -> Result<()> {
    let mut ctx = EngineContext::new();
    let doc = load_tour(input, false, &mut ctx)?;
    let fc = doc.cabinet().context("Tour has no archive")?;
    fs::create_dir_all(output).context("Failed to create output directory")?;

    let mut written = 0;
    for entry in fc.entries() {
        let Some(blob) = fc.get_file_blob(&entry.filename) else {
            log::warn!("{} is missing from the archive data", entry.filename);
            continue;
        };
        let Some(path) = archive_path(output, &entry.filename) else {
            log::warn!("skipping unsafe archive name {}", entry.filename);
            continue;
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&path, blob.data).with_context(|| format!("Failed to write {}", path.display()))?;
        written += 1;
    }

    println!("Extracted {} files to {}", written, output.display());
    Ok(())
}

fn pack_tour(manifest: &Path, output: &Path, media_dir: Option<&Path>, strict: bool) -> Result<()> {
    println!("Packing tour: {}", manifest.display());
    let xml = fs::read_to_string(manifest).context("Failed to read tour manifest")?;
    let mut ctx = EngineContext::new();
    let mut doc = TourDocument::from_xml_str(&xml, &mut ctx, &load_options(strict))
        .context("Failed to parse tour manifest")?;
    for error in ctx.take_errors() {
        println!("  warning: {}", error);
    }

    let media_dir = media_dir
        .map(Path::to_path_buf)
        .or_else(|| manifest.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));

    let mut wanted: Vec<String> = Vec::new();
    for stop in doc.stops() {
        for file in stop.referenced_files() {
            if !wanted.iter().any(|w| w == file) {
                wanted.push(file.to_string());
            }
        }
    }
    let mut missing = 0;
    for file in &wanted {
        match archive_path(&media_dir, file).filter(|p| p.is_file()) {
            Some(path) => {
                let data = fs::read(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                doc.add_cached_file(file, data);
            }
            None => {
                println!("  missing media: {}", file);
                missing += 1;
            }
        }
    }

    for index in 0..doc.tour_stop_count() {
        let Some(stop) = doc.stop_mut(index) else {
            continue;
        };
        let thumb = media_dir.join(stop.thumbnail_filename());
        if thumb.is_file() {
            let data = fs::read(&thumb)
                .with_context(|| format!("Failed to read {}", thumb.display()))?;
            stop.set_thumbnail(Some(data));
        }
    }

    let layer_ids: Vec<String> = ctx.layers.layers().iter().map(|l| l.id.clone()).collect();
    for id in layer_ids {
        let dir = media_dir.join(&id);
        let Some(layer) = ctx.layers.get_mut(&id) else {
            continue;
        };
        if !dir.is_dir() {
            continue;
        }
        let entries =
            fs::read_dir(&dir).with_context(|| format!("Failed to read {}", dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            let name = path.file_name().and_then(|n| n.to_str());
            if let (true, Some(name)) = (path.is_file(), name) {
                layer.data_files.push((name.to_string(), fs::read(&path)?));
            }
        }
    }

    let blob = doc.save_to_blob(&ctx);
    fs::write(output, &blob).context("Failed to write tour archive")?;
    println!(
        "Packed {} stops, {} media files ({} missing) into {} ({} bytes)",
        doc.tour_stop_count(),
        wanted.len() - missing,
        missing,
        output.display(),
        blob.len()
    );
    Ok(())
}

fn new_tour(
    output: &Path,
    title: &str,
    author: &str,
    stops: &[String],
    image: Option<&Path>,
) -> Result<()> {
    let mut editor = TourEditor::new(TourDocument::new());
    editor.set_properties(TourProperties {
        title: title.to_string(),
        author: author.to_string(),
        ..TourProperties::default()
    });

    let captions: Vec<String> = if stops.is_empty() {
        vec!["Slide 1".to_string()]
    } else {
        stops.to_vec()
    };
    for (index, caption) in captions.iter().enumerate() {
        editor.add_stop(TourStop::new(Place::default()))?;
        editor.set_caption(index, caption)?;
    }

    if let Some(image) = image {
        let data = fs::read(image).context("Failed to read image")?;
        let filename = image
            .file_name()
            .and_then(|n| n.to_str())
            .context("Invalid image path")?;
        editor
            .add_bitmap_overlay(0, filename, data.clone(), 960.0, 540.0)
            .context("Failed to add image overlay")?;
        editor
            .update_thumbnail_from_bytes(0, &data)
            .context("Failed to render thumbnail")?;
    }

    let mut doc = editor.into_document();
    let blob = doc.save_to_blob(&EngineContext::new());
    fs::write(output, &blob).context("Failed to write tour archive")?;
    println!(
        "Created '{}' with {} stops at {}",
        title,
        doc.tour_stop_count(),
        output.display()
    );
    Ok(())
}

fn print_timeline(input: &Path, strict: bool) -> Result<()> {
    let mut ctx = EngineContext::new();
    let mut doc = load_tour(input, strict, &mut ctx)?;
    if doc.tour_stop_count() > 0 {
        doc.set_current_tour_stop_index(Some(0))?;
    }
    let captions: Vec<String> = doc.stops().iter().map(|s| s.caption().to_string()).collect();
    let limit = captions.len() * 4 + 16;

    let mut player = TourPlayer::new(doc);
    let mut now = 0;
    let mut entered = 0;
    let mut events = player.play(now, &mut ctx)?;
    loop {
        for event in &events {
            match event {
                PlayerEvent::StopEntered { index, .. } => {
                    entered += 1;
                    let start = now - player.elapsed_in_stop(now);
                    let caption = captions.get(*index).map(String::as_str).unwrap_or("");
                    println!("{}  [{}] {}", format_duration(start), index, caption);
                }
                PlayerEvent::LinkFollowed { from, to } => {
                    println!("             link {} -> {}", from, to)
                }
                PlayerEvent::Returned { to } => println!("             return to {}", to),
                PlayerEvent::Finished => println!("{}  end", format_duration(now)),
                _ => {}
            }
        }
        if player.state() != PlayerState::Playing {
            break;
        }
        if entered >= limit {
            println!("Stopped after {} stops; the tour's links loop", entered);
            break;
        }
        now += player.remaining_in_stop(now).max(1);
        events = player.update(now, &mut ctx)?;
    }
    Ok(())
}
