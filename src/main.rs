use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, Level as LogLevel};
use tracing_subscriber::FmtSubscriber;

use reprise::{
    AlignmentStrategy, ExclusionPolicy, ExclusionResolver, Level, LevelPlan, MergeConfig,
    NgramSize, NgramTable, PipelineConfig, RunMetadata, Stage4Config, TableDocument, TaggedTable,
    TaggerConfig, WindowConfig, WindowUnit, execute_merge, execute_render, inspect,
    load_exclusion_policy, load_stopwords, load_table, load_tagged_table, run_pipeline, summarize,
    tag_table,
};

#[derive(Parser)]
#[command(name = "reprise")]
#[command(author, version, about = "Lexical and syntactic persistence tagging for dialogue transcripts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Tag one granularity table
    Tag {
        /// Input table (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// N-gram size of the input table (1-4 or unigrams..quadrigrams)
        #[arg(short, long, default_value = "unigrams")]
        ngram: NgramSize,

        /// Output file for the tagged table (JSON)
        #[arg(short, long)]
        output: PathBuf,

        /// Levels to tag, comma separated
        #[arg(long, value_delimiter = ',', default_value = "lemma")]
        levels: Vec<Level>,

        #[command(flatten)]
        tagger: TaggerArgs,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Merge previously tagged tables onto the unigram table
    Merge {
        /// Tagged unigram table (JSON)
        #[arg(long)]
        unigrams: PathBuf,

        /// Tagged bigram table (JSON)
        #[arg(long)]
        bigrams: Option<PathBuf>,

        /// Tagged trigram table (JSON)
        #[arg(long)]
        trigrams: Option<PathBuf>,

        /// Tagged quadrigram table (JSON)
        #[arg(long)]
        quadrigrams: Option<PathBuf>,

        /// Output file for the merged table (JSON)
        #[arg(short, long)]
        output: PathBuf,

        /// How n-gram rows find their first unigram (turn_offset or shared_index)
        #[arg(long, default_value = "turn_offset")]
        alignment: AlignmentStrategy,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Tag every table and merge the results
    Run {
        /// Unigram table (JSON)
        #[arg(long)]
        unigrams: PathBuf,

        /// Bigram table (JSON)
        #[arg(long)]
        bigrams: Option<PathBuf>,

        /// Trigram table (JSON)
        #[arg(long)]
        trigrams: Option<PathBuf>,

        /// Quadrigram table (JSON)
        #[arg(long)]
        quadrigrams: Option<PathBuf>,

        /// Output directory
        #[arg(short, long)]
        output_dir: PathBuf,

        /// Tag these levels for every size instead of the default plan
        #[arg(long, value_delimiter = ',')]
        levels: Option<Vec<Level>>,

        /// How n-gram rows find their first unigram (turn_offset or shared_index)
        #[arg(long, default_value = "turn_offset")]
        alignment: AlignmentStrategy,

        #[command(flatten)]
        tagger: TaggerArgs,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// List the most frequently reused values of a tagged table
    Inspect {
        /// Tagged table (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// N-gram size of the input table
        #[arg(short, long, default_value = "unigrams")]
        ngram: NgramSize,

        /// Level to inspect
        #[arg(long, default_value = "lemma")]
        level: Level,

        /// Minimum number of reuses
        #[arg(long, default_value = "5")]
        threshold: usize,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

#[derive(Args)]
struct TaggerArgs {
    /// Search window size
    #[arg(long, default_value = "150")]
    window: u64,

    /// Window unit (index or row)
    #[arg(long, default_value = "index")]
    window_unit: WindowUnit,

    /// Speaker whose values prime
    #[arg(long, default_value = "A")]
    source: String,

    /// Speaker whose reuse is tagged
    #[arg(long, default_value = "S")]
    target: String,

    /// Stopword list, one value per line
    #[arg(long)]
    stopwords: Option<PathBuf>,

    /// Exclusion policy (JSON)
    #[arg(long)]
    exclusions: Option<PathBuf>,
}

impl TaggerArgs {
    fn tagger_config(&self) -> Result<TaggerConfig> {
        let stopwords = match &self.stopwords {
            Some(path) => load_stopwords(path)
                .with_context(|| format!("Failed to load stopwords from {:?}", path))?,
            None => Default::default(),
        };
        Ok(TaggerConfig {
            source_speaker: self.source.clone(),
            target_speaker: self.target.clone(),
            window: WindowConfig {
                size: self.window,
                unit: self.window_unit,
            },
            stopwords,
            ..Default::default()
        })
    }

    fn exclusions(&self) -> Result<Box<dyn ExclusionResolver>> {
        let policy = match &self.exclusions {
            Some(path) => load_exclusion_policy(path)
                .with_context(|| format!("Failed to load exclusion policy from {:?}", path))?,
            None => ExclusionPolicy::default(),
        };
        policy.build().context("Invalid exclusion policy")
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Tag {
            input,
            ngram,
            output,
            levels,
            tagger,
            verbose,
        } => {
            setup_logging(verbose);
            tag_file(&input, ngram, &output, &levels, &tagger)
        }
        Commands::Merge {
            unigrams,
            bigrams,
            trigrams,
            quadrigrams,
            output,
            alignment,
            verbose,
        } => {
            setup_logging(verbose);
            let inputs = TableInputs {
                unigrams,
                bigrams,
                trigrams,
                quadrigrams,
            };
            merge_files(&inputs, &output, alignment)
        }
        Commands::Run {
            unigrams,
            bigrams,
            trigrams,
            quadrigrams,
            output_dir,
            levels,
            alignment,
            tagger,
            verbose,
        } => {
            setup_logging(verbose);
            let inputs = TableInputs {
                unigrams,
                bigrams,
                trigrams,
                quadrigrams,
            };
            run_all(&inputs, &output_dir, levels.as_deref(), alignment, &tagger)
        }
        Commands::Inspect {
            input,
            ngram,
            level,
            threshold,
            verbose,
        } => {
            setup_logging(verbose);
            inspect_file(&input, ngram, level, threshold)
        }
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { LogLevel::DEBUG } else { LogLevel::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

/// Table files given on the command line
struct TableInputs {
    unigrams: PathBuf,
    bigrams: Option<PathBuf>,
    trigrams: Option<PathBuf>,
    quadrigrams: Option<PathBuf>,
}

impl TableInputs {
    fn paths(&self) -> Vec<(NgramSize, &Path)> {
        let mut paths = vec![(NgramSize::Unigrams, self.unigrams.as_path())];
        let optional = [
            (NgramSize::Bigrams, &self.bigrams),
            (NgramSize::Trigrams, &self.trigrams),
            (NgramSize::Quadrigrams, &self.quadrigrams),
        ];
        for (size, path) in optional {
            if let Some(path) = path {
                paths.push((size, path.as_path()));
            }
        }
        paths
    }
}

fn tag_file(
    input: &Path,
    ngram: NgramSize,
    output: &Path,
    levels: &[Level],
    args: &TaggerArgs,
) -> Result<()> {
    info!("Loading {} table from {:?}", ngram, input);
    let table = load_table(input, ngram).context("Failed to load input table")?;
    let config = args.tagger_config()?;
    let exclusions = args.exclusions()?;

    let tagged = tag_table(table, levels, &config, exclusions.as_ref())
        .context("Failed to tag table")?;

    let metadata = RunMetadata::for_tagged(&tagged, &config);
    TableDocument::from_tagged(&tagged, metadata)?
        .write_json(output)
        .with_context(|| format!("Failed to write {:?}", output))?;
    info!("Output written to {:?}", output);

    Ok(())
}

fn merge_files(inputs: &TableInputs, output: &Path, alignment: AlignmentStrategy) -> Result<()> {
    let mut tables: Vec<TaggedTable> = Vec::new();
    for (size, path) in inputs.paths() {
        info!("Loading tagged {} table from {:?}", size, path);
        let tagged = load_tagged_table(path, size)
            .with_context(|| format!("Failed to load tagged table {:?}", path))?;
        tables.push(tagged);
    }

    // Merge
    let Some((unigrams, ngrams)) = tables.split_first() else {
        anyhow::bail!("No unigram table supplied");
    };
    let ngrams: Vec<&TaggedTable> = ngrams.iter().collect();
    let result = execute_merge(unigrams, &ngrams, &MergeConfig { alignment })
        .context("Failed to merge tables")?;

    // Write merged table
    let metadata = RunMetadata::for_merged(&result, None);
    TableDocument::from_merged(&result, metadata)?
        .write_json(output)
        .with_context(|| format!("Failed to write {:?}", output))?;
    info!("Merged table written to {:?}", output);

    Ok(())
}

fn run_all(
    inputs: &TableInputs,
    output_dir: &Path,
    levels: Option<&[Level]>,
    alignment: AlignmentStrategy,
    args: &TaggerArgs,
) -> Result<()> {
    // Load every table
    let mut tables: Vec<NgramTable> = Vec::new();
    for (size, path) in inputs.paths() {
        info!("Loading {} table from {:?}", size, path);
        tables.push(load_table(path, size).with_context(|| format!("Failed to load {:?}", path))?);
    }

    let config = PipelineConfig {
        tagger: args.tagger_config()?,
        plan: levels.map(LevelPlan::uniform).unwrap_or_default(),
        merge: MergeConfig { alignment },
    };
    let exclusions = args.exclusions()?;

    // Tag and merge
    let output = run_pipeline(tables, &config, exclusions.as_ref()).context("Pipeline failed")?;

    // Write outputs
    let rendered = execute_render(
        output_dir,
        &output.tagged,
        Some(&output.merged),
        Some(&config.tagger),
        &Stage4Config::default(),
    )
    .context("Failed to write outputs")?;

    for path in &rendered.tagged_paths {
        info!("Tagged table written to {:?}", path);
    }
    if let Some(path) = rendered.merged_path {
        info!("Merged table written to {:?}", path);
    }

    Ok(())
}

fn inspect_file(input: &Path, ngram: NgramSize, level: Level, threshold: usize) -> Result<()> {
    info!("Inspecting {} table from {:?}", ngram, input);
    let tagged = load_tagged_table(input, ngram).context("Failed to load tagged table")?;

    println!("Persistence Summary");
    println!("===================");
    for summary in summarize(&tagged) {
        println!(
            "{}: {} FPP, {} SPP",
            summary.level, summary.origins, summary.reuses
        );
    }
    println!();

    println!("Most Frequent Reuses ({} level, threshold {})", level, threshold);
    println!("-------------------------------------------");
    let frequent = inspect(&tagged, level, threshold);
    if frequent.is_empty() {
        println!("None");
    }
    for value in frequent {
        println!("{}: {}", value.value, value.count);
        for (word, count) in &value.realisations {
            println!("    {}: {}", word, count);
        }
    }

    Ok(())
}
