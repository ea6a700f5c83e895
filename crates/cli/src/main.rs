use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

use images_to_pdf_core::config::{config_path, load_config, AppConfig, OptimizeMode};
use images_to_pdf_core::pipeline::{convert_directory_to_pdf, ConversionReport, ConvertRequest};
use images_to_pdf_core::progress::{ProgressEvent, ProgressHandler};

#[derive(Parser)]
#[command(name = "images-to-pdf")]
#[command(about = "Combine a folder of images into one size-optimized PDF")]
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
    /// Convert every image under a directory into a single PDF
    Convert {
        /// Input directory containing images
        #[arg(short, long, required = true)]
        input: String,

        /// Output directory
        #[arg(short, long)]
        output: Option<String>,

        /// Output PDF file name
        #[arg(short = 'n', long)]
        name: Option<String>,

        /// Dots per inch used to size pages
        #[arg(long)]
        dpi: Option<f64>,

        /// Target width in pixels for downscaling
        #[arg(long)]
        width: Option<u32>,

        /// Per-image size ceiling in KiB for JPEG re-encoding
        #[arg(long)]
        ceiling_kb: Option<u64>,

        /// Optimization mode (strategy, size-target)
        #[arg(long)]
        mode: Option<String>,
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
}

type CliResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let result = match &cli.command {
        Commands::Convert {
            input,
            output,
            name,
            dpi,
            width,
            ceiling_kb,
            mode,
        } => run_convert(
            ConvertArgs {
                input,
                output: output.as_deref(),
                name: name.as_deref(),
                dpi: *dpi,
                width: *width,
                ceiling_kb: *ceiling_kb,
                mode: mode.as_deref(),
            },
            cli.json,
        ),
        Commands::Config { action } => run_config(action, cli.json),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

struct ConvertArgs<'a> {
    input: &'a str,
    output: Option<&'a str>,
    name: Option<&'a str>,
    dpi: Option<f64>,
    width: Option<u32>,
    ceiling_kb: Option<u64>,
    mode: Option<&'a str>,
}

/// Drives an indicatif bar from pipeline progress events.
struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new(hidden: bool) -> Self {
        let bar = if hidden {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(0)
        };
        let style = ProgressStyle::with_template("{prefix:>8} [{bar:30}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        bar.set_style(style);
        Self { bar }
    }
}

impl ProgressHandler for BarProgress {
    fn on_progress(&self, event: ProgressEvent) {
        self.bar.set_prefix(event.stage.as_str());
        self.bar.set_length(event.total);
        self.bar.set_position(event.current);
        if let Some(msg) = event.message {
            self.bar.set_message(msg);
        }
    }
}

fn run_convert(args: ConvertArgs<'_>, json: bool) -> CliResult {
    let cfg = load_config();
    let mut pipeline = cfg.pipeline;
    if let Some(dpi) = args.dpi {
        pipeline.dpi = dpi;
    }
    if let Some(width) = args.width {
        pipeline.target_width = width;
    }
    if let Some(kb) = args.ceiling_kb {
        pipeline.size_ceiling_bytes = kb
            .checked_mul(1024)
            .ok_or_else(|| format!("Size ceiling of {} KiB is too large", kb))?;
    }
    if let Some(mode) = args.mode {
        pipeline.mode = mode.parse::<OptimizeMode>()?;
    }
    pipeline.validate()?;

    let output_dir = args
        .output
        .map(str::to_string)
        .or(cfg.output.output_dir)
        .unwrap_or_else(|| ".".to_string());
    let file_name = args
        .name
        .map(str::to_string)
        .unwrap_or(cfg.output.file_name);
    let request = ConvertRequest::new(PathBuf::from(args.input), PathBuf::from(output_dir))
        .with_file_name(file_name);

    tracing::debug!(?pipeline, output = %request.output_path().display(), "Resolved configuration");

    let progress = BarProgress::new(json);
    let result = convert_directory_to_pdf(&request, &pipeline, Some(&progress as &dyn ProgressHandler));
    progress.bar.finish_and_clear();
    let report = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &ConversionReport) {
    let g = &report.geometry;
    println!("Created PDF: {}", report.output_path.display());
    println!("  Images found:  {}", report.found);
    println!("  Pages:         {}", report.pages());
    if report.skipped() > 0 {
        println!("  Skipped:       {}", report.skipped());
        for failure in &report.batch.failures {
            println!("    {}: {}", failure.path.display(), failure.reason);
        }
    }
    println!("  Average image: {:.1}x{:.1} px", g.avg_width_px, g.avg_height_px);
    println!("  Page size:     {:.1}x{:.1} pt at {} DPI", g.width_pt, g.height_pt, g.dpi);
    println!("  PDF size:      {:.2} MB", report.size.size_mb());

    if report.size.exceeds_threshold {
        println!(
            "Warning: PDF size ({:.2} MB) exceeds target of {:.1} MB",
            report.size.size_mb(),
            report.size.threshold_mb()
        );
        println!("Suggestions:");
        println!("  - Use JPEG images instead of PNG for photos");
        println!("  - Reduce image resolution before processing");
        println!("  - Consider processing fewer images per PDF");
    } else {
        println!(
            "PDF size is within target ({:.1} MB)",
            report.size.threshold_mb()
        );
    }
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
    }
    Ok(())
}
