mod session;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use sono_core::{
    AnalyzerConfig, AudioSource, BioacousticAnalyzer, BufferSource, ChirpSource, NewSpecies,
    PulseSource, SpeciesLibrary, SpeciesRecord, StokesVerification, TickOutcome, ToneSource,
};
use sono_store::{Store, config};

use crate::session::Session;

#[derive(Parser)]
#[command(name = "sono", about = "Bioacoustic topology analysis and species comparison")]
struct Cli {
    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the periodic analysis against a synthetic or recorded source
    Analyze {
        #[command(flatten)]
        source: SourceArgs,

        /// Number of analysis ticks
        #[arg(long, default_value_t = 50)]
        ticks: usize,

        /// Store the final analysis as a signature of this species
        #[arg(long)]
        capture: Option<String>,

        /// Print the final analysis summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Browse and edit the species library
    Species {
        #[command(subcommand)]
        command: SpeciesCommand,
    },

    /// Compare the first signatures of two species
    Compare { a: String, b: String },

    /// Warm up on a source, then run the structural boundary/pairing check
    Verify {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Export one species to a JSON file
    Export { id: String, path: PathBuf },

    /// Import one species from a JSON file
    Import { path: PathBuf },

    /// Replace the library with the default species
    Reset,

    /// Show library statistics
    Stats,
}

#[derive(Subcommand)]
enum SpeciesCommand {
    /// List species, optionally in one category
    List {
        #[arg(long)]
        category: Option<String>,
    },
    /// Show one species
    Show { id: String },
    /// Case-insensitive search over name, scientific name and description
    Search { query: String },
    /// Add or replace a species
    Add {
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        scientific_name: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Lower bound of the frequency range in Hz
        #[arg(long, requires = "high")]
        low: Option<f64>,
        /// Upper bound of the frequency range in Hz
        #[arg(long, requires = "low")]
        high: Option<f64>,
        /// Typical call duration in seconds
        #[arg(long)]
        duration: Option<f64>,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SourceKind {
    /// Repeating 2-8 kHz sweep
    Songbird,
    /// 160 Hz tone under a slow envelope
    Whale,
    /// Pure sine
    Tone,
}

#[derive(clap::Args)]
struct SourceArgs {
    #[arg(long, value_enum, default_value_t = SourceKind::Songbird)]
    source: SourceKind,

    /// Raw little-endian f32 mono PCM file; overrides --source
    #[arg(long)]
    input: Option<PathBuf>,

    /// Tone frequency in Hz
    #[arg(long, default_value_t = 1000.0)]
    frequency: f32,

    /// Multiply every synthetic frequency by this factor
    #[arg(long, default_value_t = 1.0)]
    shift: f32,

    /// Uniform noise amplitude added to synthetic sources
    #[arg(long, default_value_t = 0.0, value_parser = parse_noise)]
    noise: f32,

    #[arg(long, default_value_t = 1)]
    seed: u64,
}

fn parse_noise(s: &str) -> std::result::Result<f32, String> {
    let amplitude: f32 = s.parse().map_err(|e| format!("{e}"))?;
    if amplitude.is_finite() && amplitude >= 0.0 {
        Ok(amplitude)
    } else {
        Err(format!("noise amplitude must be finite and non-negative, got {s}"))
    }
}

impl SourceArgs {
    fn build(&self, sample_rate: f32) -> Result<Box<dyn AudioSource>> {
        if let Some(path) = &self.input {
            let bytes =
                std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
            if bytes.len() < 4 {
                bail!("{} holds no f32 samples", path.display());
            }
            return Ok(Box::new(BufferSource::from_f32_le_bytes(
                &bytes,
                Some(sample_rate),
            )));
        }
        let source: Box<dyn AudioSource> = match self.source {
            SourceKind::Songbird => Box::new(
                ChirpSource::songbird(sample_rate)
                    .with_frequency_shift(self.shift)
                    .with_noise(self.noise, self.seed),
            ),
            SourceKind::Whale => Box::new(
                PulseSource::whale(sample_rate)
                    .with_frequency_shift(self.shift)
                    .with_noise(self.noise, self.seed),
            ),
            SourceKind::Tone => Box::new(
                ToneSource::new(sample_rate, self.frequency, 0.5)
                    .with_frequency_shift(self.shift)
                    .with_noise(self.noise, self.seed),
            ),
        };
        Ok(source)
    }
}

struct AppContext {
    store: Store,
    config: AnalyzerConfig,
}

fn open_context() -> Result<AppContext> {
    let base = config::ensure_base_dir(&config::default_base_dir())
        .context("failed to create data directory")?;
    let config = config::load_config(&base).context("failed to load sono.toml")?;
    let store =
        Store::open(&config::database_path(&base)).context("failed to open species store")?;
    Ok(AppContext { store, config })
}

fn load_library(ctx: &AppContext) -> Result<SpeciesLibrary> {
    ctx.store
        .load_library()
        .context("failed to load species library")
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Analyze {
            source,
            ticks,
            capture,
            json,
        } => cmd_analyze(source, *ticks, capture.as_deref(), *json).await,
        Commands::Species { command } => cmd_species(command),
        Commands::Compare { a, b } => cmd_compare(a, b),
        Commands::Verify { source } => cmd_verify(source),
        Commands::Export { id, path } => cmd_export(id, path),
        Commands::Import { path } => cmd_import(path),
        Commands::Reset => cmd_reset(),
        Commands::Stats => cmd_stats(),
    }
}

async fn cmd_analyze(
    source: &SourceArgs,
    ticks: usize,
    capture: Option<&str>,
    json: bool,
) -> Result<()> {
    let ctx = open_context()?;
    let library = load_library(&ctx)?;
    if let Some(id) = capture
        && library.get_species(id).is_none()
    {
        bail!("unknown species: {id}");
    }

    let mut analyzer = BioacousticAnalyzer::with_library(ctx.config.clone(), library);
    analyzer.connect(source.build(ctx.config.pipeline.sample_rate)?);

    let session = Session::new(analyzer);
    let token = session.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });
    let summary = session.run(Some(ticks)).await;

    let shared = session.analyzer();
    let mut analyzer = shared.lock().await;
    let Some(analysis) = analyzer.current_analysis().cloned() else {
        println!(
            "ran {} ticks; still warming up ({} frames required)",
            summary.ticks,
            analyzer.config().warmup_frames
        );
        return Ok(());
    };

    if json {
        let state = analyzer.state();
        let out = serde_json::json!({
            "ticks": summary.ticks,
            "analyzed": summary.analyzed,
            "features": analysis.features,
            "barcodes": analysis.barcodes.len(),
            "phaseSpacePoints": analysis.phase_space.len(),
            "currentCount": analysis.current_count,
            "state": state,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&out).context("failed to serialize analysis")?
        );
    } else {
        let f = analysis.features;
        println!("ticks:       {} ({} analyzed)", summary.ticks, summary.analyzed);
        println!(
            "features:    bass={:.3} mid={:.3} treble={:.3} centroid={:.3} spread={:.3}",
            f.bass, f.mid, f.treble, f.centroid, f.spread
        );
        println!("points:      {}", analysis.phase_space.len());
        println!("barcodes:    {}", analysis.barcodes.len());
        if let Some(top) = analysis.barcodes.first() {
            println!(
                "longest:     birth={:.3} death={:.3} persistence={:.3}",
                top.birth, top.death, top.persistence
            );
        }
        println!(
            "currents:    0-d={} 1-d={} 2-d={}",
            analysis.current_count.zero, analysis.current_count.one, analysis.current_count.two
        );
    }

    if let Some(id) = capture {
        let sig = analyzer
            .capture_signature(id)
            .with_context(|| format!("failed to capture signature for {id}"))?;
        ctx.store
            .save_library(analyzer.library())
            .context("failed to save species library")?;
        println!("captured signature {sig} for {id}");
    }
    Ok(())
}

fn cmd_species(command: &SpeciesCommand) -> Result<()> {
    let ctx = open_context()?;
    let mut library = load_library(&ctx)?;

    match command {
        SpeciesCommand::List { category } => {
            let records: Vec<&SpeciesRecord> = match category {
                Some(c) => library.get_species_by_category(c),
                None => library.species().collect(),
            };
            if records.is_empty() {
                println!("(no species)");
            }
            for r in records {
                print_species_line(r);
            }
        }
        SpeciesCommand::Show { id } => {
            let Some(r) = library.get_species(id) else {
                bail!("unknown species: {id}");
            };
            println!("id:          {}", r.id);
            println!("name:        {}", r.name);
            if let Some(s) = &r.scientific_name {
                println!("scientific:  {s}");
            }
            println!("category:    {}", r.category);
            println!(
                "frequency:   {:.0}-{:.0} Hz",
                r.frequency_range[0], r.frequency_range[1]
            );
            println!("duration:    {:.1} s", r.typical_duration);
            if !r.description.is_empty() {
                println!("description: {}", r.description);
            }
            if !r.tags.is_empty() {
                println!("tags:        {}", r.tags.join(", "));
            }
            println!("signatures:  {}", r.signatures.len());
            println!(
                "stats:       freq={:.3} amp={:.3} complexity={:.1}",
                r.stats.avg_frequency, r.stats.avg_amplitude, r.stats.avg_complexity
            );
            println!("added:       {}", r.date_added);
        }
        SpeciesCommand::Search { query } => {
            let hits = library.search_species(query);
            if hits.is_empty() {
                println!("(no matches)");
            }
            for r in hits {
                print_species_line(r);
            }
        }
        SpeciesCommand::Add {
            id,
            name,
            scientific_name,
            category,
            description,
            low,
            high,
            duration,
            tags,
        } => {
            let frequency_range = match (low, high) {
                (Some(lo), Some(hi)) if lo > hi => bail!("--low must not exceed --high"),
                (Some(lo), Some(hi)) => Some([*lo, *hi]),
                _ => None,
            };
            let id = library.add_species(NewSpecies {
                id: id.clone(),
                name: name.clone(),
                scientific_name: scientific_name.clone(),
                category: category.clone(),
                description: description.clone(),
                frequency_range,
                typical_duration: *duration,
                tags: tags.clone(),
            });
            ctx.store
                .save_library(&library)
                .context("failed to save species library")?;
            println!("added species {id}");
        }
    }
    Ok(())
}

fn print_species_line(r: &SpeciesRecord) {
    println!(
        "{:<20} {:<24} {:<10} {:>6.0}-{:<6.0} Hz  {} signatures",
        r.id,
        r.name,
        r.category,
        r.frequency_range[0],
        r.frequency_range[1],
        r.signatures.len()
    );
}

fn cmd_compare(a: &str, b: &str) -> Result<()> {
    let ctx = open_context()?;
    let library = load_library(&ctx)?;
    for id in [a, b] {
        match library.get_species(id) {
            None => bail!("unknown species: {id}"),
            Some(r) if r.signatures.is_empty() => {
                bail!("species {id} has no signatures; capture one with `sono analyze --capture {id}`")
            }
            Some(_) => {}
        }
    }
    let cmp = library
        .compare_species(a, b)
        .with_context(|| format!("failed to compare {a} and {b}"))?;

    println!("{} vs {}", cmp.species1.name, cmp.species2.name);
    println!("similarity:      {:.4}", cmp.similarity);
    println!("  forms:         {:.4}", cmp.details.forms);
    println!("  currents:      {:.4}", cmp.details.currents);
    println!("  homology:      {:.4}", cmp.details.homology);
    println!("frequency shift: {:.4}", cmp.frequency_shift);
    Ok(())
}

fn cmd_verify(source: &SourceArgs) -> Result<()> {
    let ctx = open_context()?;
    let mut analyzer = BioacousticAnalyzer::with_library(ctx.config.clone(), SpeciesLibrary::empty());
    analyzer.connect(source.build(ctx.config.pipeline.sample_rate)?);

    // Run until the first analysis that produced a trajectory.
    let limit = ctx.config.warmup_frames + ctx.config.pipeline.max_frames;
    let mut ran = 0;
    while ran < limit {
        ran += 1;
        if analyzer.process_frame() == TickOutcome::Analyzed
            && analyzer.state().homology.currents.one > 0
        {
            break;
        }
    }

    match analyzer.verify_stokes_theorem() {
        Some(StokesVerification::Evaluated {
            lhs,
            rhs,
            error,
            verified,
        }) => {
            println!("ticks:    {ran}");
            println!("check:    structural (constant energy 0-form)");
            println!("lhs:      {lhs:.6e}");
            println!("rhs:      {rhs:.6e}");
            println!("error:    {error:.3e}");
            println!("verified: {verified}");
            if !verified {
                bail!("boundary and pairing disagree");
            }
        }
        Some(StokesVerification::BoundaryZero) => println!("verified: true (boundary is zero)"),
        None => bail!("no trajectory after {ran} ticks; try a louder source"),
    }
    Ok(())
}

fn cmd_export(id: &str, path: &Path) -> Result<()> {
    let ctx = open_context()?;
    ctx.store
        .export_species_file(id, path)
        .with_context(|| format!("failed to export {id}"))?;
    println!("exported {id} to {}", path.display());
    Ok(())
}

fn cmd_import(path: &Path) -> Result<()> {
    let ctx = open_context()?;
    // Seed the defaults before the first import so they are not lost.
    let library = load_library(&ctx)?;
    if ctx.store.species_count()? == 0 {
        ctx.store
            .save_library(&library)
            .context("failed to save species library")?;
    }
    let id = ctx
        .store
        .import_species_file(path)
        .with_context(|| format!("failed to import {}", path.display()))?;
    println!("imported {id} from {}", path.display());
    Ok(())
}

fn cmd_reset() -> Result<()> {
    let ctx = open_context()?;
    let library = SpeciesLibrary::new();
    ctx.store
        .save_library(&library)
        .context("failed to save species library")?;
    println!("library reset to {} default species", library.len());
    Ok(())
}

fn cmd_stats() -> Result<()> {
    let ctx = open_context()?;
    let library = load_library(&ctx)?;
    let stats = library.stats();
    println!("species:     {}", stats.total_species);
    println!("signatures:  {}", stats.total_signatures);
    println!("per species: {:.2}", stats.avg_signatures_per_species);
    for (category, count) in &stats.category_counts {
        println!("  {category:<10} {count}");
    }
    Ok(())
}
