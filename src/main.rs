use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use wiktionary_lexicon::config::ExtractConfig;
use wiktionary_lexicon::convert::convert_defs;
use wiktionary_lexicon::dump::PageReader;
use wiktionary_lexicon::lexicon::{run_build, BuildOptions, BuildStats, LexiconBuilder};
use wiktionary_lexicon::output::{Manifest, ShardedWriter};
use wiktionary_lexicon::progress::{format_duration, BuildProgress};
use wiktionary_lexicon::redirects::RedirectTable;
use wiktionary_lexicon::wordlist::{split_words, SplitOptions};

#[derive(Parser)]
#[command(name = "wiktionary-lexicon")]
#[command(about = "Build a crossword lexicon with short definitions from a Wiktionary dump")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Stream a pages-articles dump into length-sharded word and definition files
    Build(BuildArgs),
    /// Split a plain word list into words-N.txt files
    SplitWords(SplitArgs),
    /// Convert defs-N.jsonl shards into defs-N.json word -> senses maps
    ConvertDefs(ConvertArgs),
}

#[derive(Args)]
struct BuildArgs {
    /// Input dump (.xml or .xml.bz2)
    #[arg(long)]
    xml: PathBuf,

    /// Output directory
    #[arg(long, default_value = "out")]
    out: PathBuf,

    /// YAML config file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Language section to read (level-2 heading text)
    #[arg(long)]
    language: Option<String>,

    #[arg(long)]
    min_len: Option<usize>,

    #[arg(long)]
    max_len: Option<usize>,

    /// Allowed part-of-speech heading (repeatable)
    #[arg(long = "pos")]
    pos: Vec<String>,

    #[arg(long)]
    max_defs_per_pos: Option<usize>,

    /// Template expansion pass bound
    #[arg(long)]
    max_passes: Option<usize>,

    /// redirect.sql[.gz] (needs --page-sql)
    #[arg(long)]
    redirect_sql: Option<PathBuf>,

    /// page.sql[.gz] (needs --redirect-sql)
    #[arg(long)]
    page_sql: Option<PathBuf>,

    /// Truncate existing shards instead of appending
    #[arg(long)]
    overwrite: bool,

    /// Drop repeated words within each length
    #[arg(long)]
    dedupe: bool,

    /// Refresh progress every N pages
    #[arg(long, default_value_t = 200_000)]
    progress_every: u64,

    /// Limit number of pages to scan (for testing)
    #[arg(long)]
    page_limit: Option<u64>,

    /// Quiet mode - no progress bar or summary
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Args)]
struct SplitArgs {
    /// Word list, one word per line
    #[arg(long)]
    input: PathBuf,

    #[arg(long)]
    outdir: PathBuf,

    #[arg(long, default_value_t = 2)]
    min_len: usize,

    /// No limit when omitted
    #[arg(long)]
    max_len: Option<usize>,

    /// Keep words with characters outside A-Z
    #[arg(long)]
    keep_non_alpha: bool,

    #[arg(long)]
    no_uppercase: bool,

    #[arg(long)]
    dedupe: bool,
}

#[derive(Args)]
struct ConvertArgs {
    #[arg(long)]
    in_dir: PathBuf,

    #[arg(long)]
    out_dir: PathBuf,
}

fn resolve_config(args: &BuildArgs) -> Result<ExtractConfig> {
    let mut config = match &args.config {
        Some(path) => ExtractConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ExtractConfig::default(),
    };
    if let Some(language) = &args.language {
        config.language = language.clone();
    }
    if let Some(min_len) = args.min_len {
        config.min_len = min_len;
    }
    if let Some(max_len) = args.max_len {
        config.max_len = max_len;
    }
    if !args.pos.is_empty() {
        config.allowed_pos = args.pos.iter().cloned().collect();
    }
    if let Some(max_defs) = args.max_defs_per_pos {
        config.max_defs_per_pos = max_defs;
    }
    if let Some(max_passes) = args.max_passes {
        config.max_passes = max_passes;
    }
    config.validate()?;
    Ok(config)
}

fn load_redirects(args: &BuildArgs) -> Result<Option<RedirectTable>> {
    match (&args.redirect_sql, &args.page_sql) {
        (Some(redirect_sql), Some(page_sql)) => {
            let table = RedirectTable::load(redirect_sql, page_sql).with_context(|| {
                format!("loading redirects from {} and {}", redirect_sql.display(), page_sql.display())
            })?;
            Ok(Some(table))
        }
        (Some(_), None) | (None, Some(_)) => {
            warn!("redirects need both --redirect-sql and --page-sql; skipping redirects");
            Ok(None)
        }
        (None, None) => Ok(None),
    }
}

fn absolute(path: &Path) -> String {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf()).display().to_string()
}

fn print_stats(stats: &BuildStats, manifest: &Manifest, elapsed: std::time::Duration) {
    println!();
    println!("============================================================");
    println!("Pages processed: {}", stats.pages_seen);
    println!("Entries kept: {}", stats.entries_kept);
    println!("  from redirects: {}", stats.alias_entries);
    println!("Definition records written: {}", stats.definition_records);
    println!("------------------------------------------------------------");
    println!("Skipped:");
    for (reason, count) in &manifest.skipped {
        println!("  {}: {}", reason, count);
    }
    println!("------------------------------------------------------------");
    println!("Time: {}", format_duration(elapsed));
    println!("Rate: {:.0} pages/sec", stats.pages_seen as f64 / elapsed.as_secs_f64().max(1e-9));
    println!("Output written to: {}", manifest.out);
    println!("============================================================");
}

fn build(args: BuildArgs) -> Result<()> {
    let config = resolve_config(&args)?;

    let mut builder = LexiconBuilder::from_config(&config)?;
    if let Some(redirects) = load_redirects(&args)? {
        builder = builder.with_redirects(redirects);
    }

    let mut pages = PageReader::open(&args.xml)
        .with_context(|| format!("opening dump {}", args.xml.display()))?;
    let mut writer = ShardedWriter::create(&args.out, args.overwrite, args.dedupe)
        .with_context(|| format!("creating output directory {}", args.out.display()))?;

    if !args.quiet {
        println!("Parsing: {}", args.xml.display());
        println!("Output: {}", args.out.display());
        println!("Language: {}", config.language);
        if let Some(limit) = args.page_limit {
            println!("Page limit: {}", limit);
        }
        println!();
    }

    let total_bytes = fs::metadata(&args.xml).ok().map(|m| m.len());
    let progress = BuildProgress::new(total_bytes, args.quiet);
    let options = BuildOptions { page_limit: args.page_limit, progress_every: args.progress_every };
    let stats = run_build(&mut pages, &builder, &mut writer, &progress, options)?;
    progress.finish();

    let manifest = Manifest {
        xml: absolute(&args.xml),
        out: absolute(&args.out),
        language: config.language.clone(),
        min_len: config.min_len,
        max_len: config.max_len,
        allowed_pos: config.allowed_pos.iter().cloned().collect(),
        max_defs_per_pos: config.max_defs_per_pos,
        max_passes: config.max_passes,
        total_pages_seen: stats.pages_seen,
        total_entries_kept: stats.entries_kept,
        total_definition_records: stats.definition_records,
        alias_entries: stats.alias_entries,
        counts_by_length: writer.counts_by_len().clone(),
        defs_by_length: writer.defs_by_len().clone(),
        skipped: stats.skipped_by_name(),
        redirects_loaded: builder.redirects_loaded(),
        notes: Manifest::default_notes(),
    };
    let manifest_path = manifest
        .write(&args.out)
        .with_context(|| format!("writing manifest to {}", args.out.display()))?;
    info!(path = %manifest_path.display(), "manifest written");

    if !args.quiet {
        print_stats(&stats, &manifest, progress.elapsed());
    }
    Ok(())
}

fn split(args: SplitArgs) -> Result<()> {
    let options = SplitOptions {
        min_len: args.min_len,
        max_len: args.max_len,
        uppercase: !args.no_uppercase,
        alpha_only: !args.keep_non_alpha,
        dedupe: args.dedupe,
    };
    let manifest = split_words(&args.input, &args.outdir, &options)
        .with_context(|| format!("splitting {}", args.input.display()))?;
    println!(
        "Done. Wrote {} files to {}",
        manifest.counts_by_length.len(),
        args.outdir.display()
    );
    println!("Total words written: {}", manifest.total_words_written);
    println!("Manifest: {}", args.outdir.join("lengths.json").display());
    Ok(())
}

fn convert(args: ConvertArgs) -> Result<()> {
    let written = convert_defs(&args.in_dir, &args.out_dir)
        .with_context(|| format!("converting shards in {}", args.in_dir.display()))?;
    for (path, words) in written {
        println!("Wrote {} ({} words)", path.display(), words);
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("wiktionary_lexicon=info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Build(args) => build(args),
        Command::SplitWords(args) => split(args),
        Command::ConvertDefs(args) => convert(args),
    }
}
