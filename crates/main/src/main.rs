use std::error::Error;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use chrono::Local;
use clap::{Args, Parser, Subcommand};
use log::LevelFilter;
use report_composer::{tools, ComposerConfig, RenderOptions, RenderOutcome, ReportComposer};
use serde_json::Value;

/// Renders PDF reports from JSON document descriptions.
///
/// Fonts are taken from `assets/fonts` (or `REPORT_COMPOSER_FONTS_DIR`) with a
/// fallback to common system families.  Set `REPORT_COMPOSER_LOG` to adjust
/// logging, e.g. `REPORT_COMPOSER_LOG=debug`.
#[derive(Parser)]
#[command(author, version, about = "Compose PDF reports from JSON")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a document description (`-` reads standard input).
    Render {
        input: PathBuf,
        #[command(flatten)]
        output: OutputArgs,
        /// Add a bar chart of numeric table values when the document has none.
        #[arg(long)]
        summary_chart: bool,
        /// Print the generation time on the cover page.
        #[arg(long)]
        timestamp: bool,
    },

    /// Render a flat JSON record as a one-table report.
    Record {
        input: PathBuf,
        #[command(flatten)]
        output: OutputArgs,
        /// Skip the bar chart of the record's numeric values.
        #[arg(long)]
        no_chart: bool,
    },

    /// Print the tool registry as JSON.
    Tools,

    /// Invoke a registry tool with a JSON argument object.
    Invoke {
        tool: String,
        /// File holding the argument object (`-` reads standard input).
        args: PathBuf,
    },
}

#[derive(Args)]
struct OutputArgs {
    /// Output file; defaults to a unique name in the reports directory.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Warn)
        .parse_env(
            env_logger::Env::default().filter_or("REPORT_COMPOSER_LOG", "warn,report_composer=info"),
        )
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("Error: {}", err);
        print_error_sources(err.as_ref());
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = match &cli.config {
        Some(path) => ComposerConfig::load(path)?,
        None => ComposerConfig::from_env(),
    };
    let composer = ReportComposer::new(config);

    match cli.command {
        Commands::Render {
            input,
            output,
            summary_chart,
            timestamp,
        } => {
            let document = read_json(&input)?;
            let mut options = RenderOptions::new()
                .with_output_path(output.output)
                .with_summary_chart(summary_chart);
            if timestamp {
                options = options.with_timestamp(Local::now());
            }
            let outcome = composer.render_value(&document, &options)?;
            report(&outcome);
        }
        Commands::Record {
            input,
            output,
            no_chart,
        } => {
            let data = read_json(&input)?;
            let options = RenderOptions::new()
                .with_output_path(output.output)
                .with_summary_chart(!no_chart)
                .with_timestamp(Local::now());
            let outcome = composer.render_record(&data, &options)?;
            report(&outcome);
        }
        Commands::Tools => {
            println!("{}", serde_json::to_string_pretty(&tools::definitions_json())?);
        }
        Commands::Invoke { tool, args } => {
            let args = read_json(&args)?;
            let result = tools::invoke(&composer, &tool, &args);
            println!("{}", serde_json::to_string_pretty(&result)?);
            if result.get("error").is_some() {
                std::process::exit(2);
            }
        }
    }

    Ok(())
}

fn read_json(path: &Path) -> Result<Value, Box<dyn Error>> {
    let text = if path == Path::new("-") {
        let mut text = String::new();
        io::stdin().read_to_string(&mut text)?;
        text
    } else {
        fs::read_to_string(path)
            .map_err(|err| format!("failed to read {}: {}", path.display(), err))?
    };
    Ok(serde_json::from_str(&text)?)
}

fn report(outcome: &RenderOutcome) {
    println!(
        "Generated {} ({} page(s))",
        outcome.path.display(),
        outcome.page_count
    );
    for warning in &outcome.warnings {
        eprintln!("warning: {}", warning);
    }
}

fn print_error_sources(mut error: &(dyn Error + 'static)) {
    while let Some(source) = error.source() {
        eprintln!("  caused by: {}", source);
        error = source;
    }
}
