use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use comicbox_core::comic::{DivinaExtractor, ZipExtractor};
use comicbox_core::config::{config_path, extract_options_from_config, load_config, AppConfig, ExtractOptions};
use comicbox_core::detect::MagicContentDetector;
use comicbox_core::epub::EpubExtractor;
use comicbox_core::imaging::{DefaultImageAnalyzer, ProportionalCoverSelector};
use comicbox_core::model::EpubTocEntry;

type CliResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[derive(Parser)]
#[command(name = "comicbox")]
#[command(about = "Inspect comic archives and EPUB publications")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the reading manifest of an EPUB
    Manifest {
        /// Input EPUB
        #[arg(required = true)]
        input: PathBuf,

        /// Skip image dimension analysis
        #[arg(long)]
        no_dimensions: bool,
    },

    /// List the entries of a comic archive
    Entries {
        /// Input archive
        #[arg(required = true)]
        input: PathBuf,

        /// Skip image dimension analysis
        #[arg(long)]
        no_dimensions: bool,
    },

    /// Extract a single entry
    Entry {
        /// Input archive
        #[arg(required = true)]
        input: PathBuf,

        /// Entry name (percent-encoded names are accepted)
        #[arg(required = true)]
        name: String,

        /// Output file
        #[arg(short, long, required = true)]
        output: PathBuf,
    },

    /// Extract the cover image
    Cover {
        /// Input archive or EPUB
        #[arg(required = true)]
        input: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Initialize default config file
    Init,
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Key (dot-separated path)
        key: String,
        /// Value
        value: String,
    },
}

struct Extractors {
    epub: EpubExtractor,
    zip: ZipExtractor,
    analyze_dimensions: bool,
}

impl Extractors {
    fn from_config(cfg: &AppConfig) -> Self {
        let options: ExtractOptions = extract_options_from_config(cfg);
        let detector = Arc::new(MagicContentDetector);
        let analyzer = Arc::new(DefaultImageAnalyzer);
        Self {
            epub: EpubExtractor::new(detector.clone(), analyzer.clone(), options.clone()),
            zip: ZipExtractor::new(detector, analyzer, Arc::new(ProportionalCoverSelector), options),
            analyze_dimensions: cfg.extract.analyze_dimensions,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cfg = load_config();
    tracing::debug!(
        "Extract options: letter threshold {}, dimensions {}",
        cfg.extract.divina_letter_count_threshold,
        cfg.extract.analyze_dimensions
    );
    let extractors = Extractors::from_config(&cfg);

    let result = match &cli.command {
        Commands::Manifest { input, no_dimensions } => run_manifest(&extractors, input, *no_dimensions, cli.json),
        Commands::Entries { input, no_dimensions } => run_entries(&extractors, input, *no_dimensions, cli.json),
        Commands::Entry { input, name, output } => run_entry(&extractors, input, name, output, cli.json),
        Commands::Cover { input, output } => run_cover(&extractors, input, output.as_deref(), cli.json),
        Commands::Config { action } => run_config(action, cli.json),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run_manifest(extractors: &Extractors, input: &Path, no_dimensions: bool, json: bool) -> CliResult {
    let analyze = extractors.analyze_dimensions && !no_dimensions;
    let manifest = extractors.epub.get_manifest(input, analyze)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&manifest)?);
        return Ok(());
    }

    println!("Layout: {}", if manifest.is_fixed_layout { "fixed" } else { "reflowable" });
    println!("Resources: {}", manifest.resources.len());
    if !manifest.missing_resources.is_empty() {
        println!("Missing resources: {}", manifest.missing_resources.len());
        for missing in &manifest.missing_resources {
            println!("  {}", missing.file_name);
        }
    }
    println!("Page count: {}", manifest.page_count);
    println!("Positions: {}", manifest.positions.len());
    if !manifest.divina_pages.is_empty() {
        println!("Comic pages: {}", manifest.divina_pages.len());
    }
    if !manifest.toc.is_empty() {
        println!("Table of contents:");
        print_toc(&manifest.toc, 1);
    }
    if !manifest.landmarks.is_empty() {
        println!("Landmarks:");
        print_toc(&manifest.landmarks, 1);
    }
    if !manifest.page_list.is_empty() {
        println!("Page list: {} entries", manifest.page_list.len());
    }
    Ok(())
}

fn print_toc(entries: &[EpubTocEntry], depth: usize) {
    for entry in entries {
        let title = entry.title.as_deref().unwrap_or("(untitled)");
        match &entry.href {
            Some(href) => println!("{}{} -> {}", "  ".repeat(depth), title, href),
            None => println!("{}{}", "  ".repeat(depth), title),
        }
        print_toc(&entry.children, depth + 1);
    }
}

fn run_entries(extractors: &Extractors, input: &Path, no_dimensions: bool, json: bool) -> CliResult {
    let analyze = extractors.analyze_dimensions && !no_dimensions;
    let entries = extractors.zip.get_entries(input, analyze)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    for entry in &entries {
        let media_type = entry.media_type.as_deref().unwrap_or("?");
        let dimension = entry
            .dimension
            .map(|d| format!(" {}x{}", d.width, d.height))
            .unwrap_or_default();
        match &entry.comment {
            Some(comment) => println!("{}\t{}\t({})", entry.name, media_type, comment),
            None => println!("{}\t{}{}", entry.name, media_type, dimension),
        }
    }
    Ok(())
}

fn run_entry(extractors: &Extractors, input: &Path, name: &str, output: &Path, json: bool) -> CliResult {
    let bytes = if extractors.epub.is_epub(input) {
        extractors.epub.get_entry_stream(input, name)?
    } else {
        extractors.zip.get_entry_stream(input, name)?
    };
    std::fs::write(output, &bytes)?;

    if json {
        let info = serde_json::json!({ "entry": name, "output": output, "size": bytes.len() });
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        println!("Extracted {} ({} bytes) to {}", name, bytes.len(), output.display());
    }
    Ok(())
}

fn run_cover(extractors: &Extractors, input: &Path, output: Option<&Path>, json: bool) -> CliResult {
    let cover = if extractors.epub.is_epub(input) {
        extractors.epub.get_cover(input)?
    } else {
        extractors.zip.get_cover(input)?
    };

    let ext = match cover.media_type.as_str() {
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "jpg",
    };
    let out_path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| input.parent().unwrap_or(Path::new(".")).join(format!("cover.{}", ext)));
    std::fs::write(&out_path, &cover.bytes)?;

    if json {
        let info = serde_json::json!({ "output": out_path, "mediaType": cover.media_type });
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        println!("Extracted cover to {}", out_path.display());
    }
    Ok(())
}

fn run_config(action: &ConfigAction, json: bool) -> CliResult {
    match action {
        ConfigAction::Init => {
            let path = config_path().ok_or("Could not determine config directory")?;
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let toml = toml::to_string_pretty(&AppConfig::default())?;
            std::fs::write(&path, toml)?;
            println!("Wrote default config to {}", path.display());
        }
        ConfigAction::Show => {
            let cfg = load_config();
            if json {
                println!("{}", serde_json::to_string_pretty(&cfg)?);
            } else {
                println!("{}", toml::to_string_pretty(&cfg)?);
            }
        }
        ConfigAction::Set { key, value } => {
            let path = config_path().ok_or("Could not determine config directory")?;
            let mut cfg = load_config();
            set_config_key(&mut cfg, key, value)?;

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, toml::to_string_pretty(&cfg)?)?;
            if !json {
                println!("Updated {}", key);
            }
        }
    }
    Ok(())
}

fn set_config_key(cfg: &mut AppConfig, key: &str, value: &str) -> CliResult {
    let parts: Vec<&str> = key.splitn(2, '.').collect();
    match parts.as_slice() {
        ["extract", sub] => match *sub {
            "divina_letter_count_threshold" => cfg.extract.divina_letter_count_threshold = value.parse()?,
            "analyze_dimensions" => cfg.extract.analyze_dimensions = value.parse()?,
            _ => return Err(format!("Unknown key: {}", key).into()),
        },
        ["security", sub] => match *sub {
            "max_file_size_mb" => cfg.security.max_file_size_mb = value.parse().ok(),
            "max_compression_ratio" => cfg.security.max_compression_ratio = value.parse().ok(),
            "max_file_count" => cfg.security.max_file_count = value.parse().ok(),
            _ => return Err(format!("Unknown key: {}", key).into()),
        },
        _ => return Err(format!("Unknown key: {}", key).into()),
    }
    Ok(())
}
