use clap::{ArgAction, Args, Parser, Subcommand};
use pacc::{load, load_with, Archive, EntryMeta, LoadOptions, PacWriter, WriterOptions};
use serde::Deserialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pac", about = "The PAC archive container CLI")]
struct Cli {
    /// Log verbosity: -v debug, -vv trace (default: RUST_LOG or warn)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Source {
    /// Archive to read
    input: PathBuf,
    /// Accept duplicate paths and gaps between entries
    #[arg(long)]
    permissive: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Pack files into a PAC archive
    Create {
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long, default_value = "0")]
        saver_version: u32,
        /// Intended consumer of the archive
        #[arg(short, long, default_value = "")]
        target: String,
        #[arg(long, default_value = "0")]
        flags: u32,
        /// JSON list of {"path", "source", "flags", "entry_type"}
        #[arg(short, long)]
        manifest: Option<PathBuf>,
        /// Files stored as /<file name>
        input: Vec<PathBuf>,
    },
    /// List entries
    List {
        #[command(flatten)]
        source: Source,
        #[arg(long)]
        json: bool,
    },
    /// Show header fields
    Info {
        #[command(flatten)]
        source: Source,
        #[arg(long)]
        json: bool,
    },
    /// Write one entry's bytes to stdout
    Cat {
        #[command(flatten)]
        source: Source,
        path: String,
    },
    /// Extract every entry below a directory
    Extract {
        #[command(flatten)]
        source: Source,
        #[arg(short = 'C', long, default_value = ".")]
        output_dir: PathBuf,
    },
    /// Load with every check enabled
    Verify {
        input: PathBuf,
    },
    /// Build a one-file sample archive, then read it back
    Demo {
        #[arg(short, long, default_value = "archive.pac")]
        output: PathBuf,
    },
}

#[derive(Deserialize)]
struct ManifestItem {
    path:       String,
    source:     PathBuf,
    #[serde(default)]
    flags:      u32,
    #[serde(default)]
    entry_type: u32,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {

        // ── Create ───────────────────────────────────────────────────────────
        Commands::Create { output, saver_version, target, flags, manifest, input } => {
            let mut items = match &manifest {
                Some(path) => read_manifest(path)?,
                None       => Vec::new(),
            };
            for path in &input {
                items.push(ManifestItem {
                    path:       entry_path_for(path)?,
                    source:     path.clone(),
                    flags:      0,
                    entry_type: 0,
                });
            }
            if items.is_empty() {
                return Err("nothing to pack: give input files or --manifest".into());
            }

            let opts = WriterOptions::new()
                .with_saver_version(saver_version)
                .with_target(target.into_bytes())
                .with_flags(flags);
            let mut writer = PacWriter::new(opts);
            writer.begin()?;
            for item in items {
                let data = fs::read(&item.source)?;
                let meta = EntryMeta::new(item.path)
                    .with_flags(item.flags)
                    .with_type(item.entry_type);
                let entry = writer.add_entry(meta, &data)?;
                println!("  packed  {} ({} B)", entry.path, entry.length);
            }
            let count = writer.entries().len();
            let bytes = writer.finalize()?;
            writer.close();
            fs::write(&output, &bytes)?;
            println!("Created: {} ({} entries, {} B)", output.display(), count, bytes.len());
        }

        // ── List ─────────────────────────────────────────────────────────────
        Commands::List { source, json } => {
            let ar = open_archive(&source)?;
            if json {
                println!("{}", serde_json::to_string_pretty(ar.entries())?);
            } else {
                println!("{:<32} {:>12} {:>6} {:>10}  MD5", "Path", "Size", "Type", "Flags");
                for e in ar.entries() {
                    println!("{:<32} {:>12} {:>6} {:>#10x}  {}",
                        e.path, e.length, e.entry_type, e.flags, e.hash);
                }
            }
        }

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { source, json } => {
            let ar   = open_archive(&source)?;
            let info = ar.info();
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("── PAC Archive ──────────────────────────────────────────");
                println!("  Path           {}", source.input.display());
                println!("  Format version {}", info.format_version);
                println!("  Saver version  {}", info.saver_version);
                println!("  Target         {:?}", info.target);
                println!("  Flags          {:#010x}", info.flags);
                println!("  Data start     {} B", info.data_start);
                println!("  Table start    {} B", info.table_start);
                println!("  Data size      {} B", info.data_len);
                println!("  Entries        {}", info.entry_count);
            }
        }

        // ── Cat ──────────────────────────────────────────────────────────────
        Commands::Cat { source, path } => {
            let ar   = open_archive(&source)?;
            let data = ar.data_by_path(&path)
                .ok_or_else(|| format!("entry not found: {path}"))?;
            io::stdout().lock().write_all(data)?;
        }

        // ── Extract ──────────────────────────────────────────────────────────
        Commands::Extract { source, output_dir } => {
            let ar = open_archive(&source)?;
            for (entry, data) in ar.iter() {
                let dest = output_dir.join(relative_path(&entry.path)?);
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&dest, data)?;
                println!("  extracted  {}", dest.display());
            }
            println!("Extracted {} entries to: {}", ar.len(), output_dir.display());
        }

        // ── Verify ───────────────────────────────────────────────────────────
        Commands::Verify { input } => {
            let ar = load(&fs::read(&input)?)?;
            println!("OK: {} entries, {} B of data, all hashes valid", ar.len(), ar.data().len());
        }

        // ── Demo ─────────────────────────────────────────────────────────────
        Commands::Demo { output } => {
            let mut writer = PacWriter::new(
                WriterOptions::new().with_saver_version(1000).with_target("hi"),
            );
            writer.begin()?;
            writer.add_entry(EntryMeta::new("/hello.txt"), b"Hello, World!")?;
            let bytes = writer.finalize()?;
            writer.close();
            fs::write(&output, &bytes)?;
            println!("PAC file created: {}", output.display());

            let ar = load(&fs::read(&output)?)?;
            for e in ar.entries() {
                println!("Path: {}", e.path);
                println!("Size: {}", e.length);
            }
            let data = ar.data_by_path("/hello.txt").ok_or("file not found")?;
            println!("Data: {}", String::from_utf8_lossy(data));
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("pacc=debug"),
        _ => EnvFilter::new("pacc=trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn open_archive(source: &Source) -> Result<Archive, Box<dyn std::error::Error>> {
    let bytes = fs::read(&source.input)?;
    let opts = if source.permissive { LoadOptions::permissive() } else { LoadOptions::default() };
    Ok(load_with(&bytes, opts)?)
}

fn read_manifest(path: &Path) -> Result<Vec<ManifestItem>, Box<dyn std::error::Error>> {
    let mut items: Vec<ManifestItem> = serde_json::from_slice(&fs::read(path)?)?;
    // Sources are relative to the manifest itself.
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    for item in &mut items {
        if item.source.is_relative() {
            item.source = base.join(&item.source);
        }
    }
    Ok(items)
}

fn entry_path_for(file: &Path) -> Result<String, Box<dyn std::error::Error>> {
    let name = file
        .file_name()
        .ok_or_else(|| format!("{} has no file name", file.display()))?;
    Ok(format!("/{}", name.to_string_lossy()))
}

/// Map an entry path onto a relative filesystem path, refusing anything that
/// would climb out of the extraction directory or replace it (`..`, drive
/// prefixes, backslash separators).
fn relative_path(entry_path: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let mut out = PathBuf::new();
    for part in entry_path.split('/').filter(|p| !p.is_empty() && *p != ".") {
        let normal = Path::new(part)
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !normal || part.contains(['\\', ':']) {
            return Err(format!("refusing to extract {entry_path:?}").into());
        }
        out.push(part);
    }
    if out.as_os_str().is_empty() {
        return Err(format!("entry {entry_path:?} names no file").into());
    }
    Ok(out)
}
