use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use klio_config::io::{JsonExporter, YamlExporter, DEFAULT_CONFIG_FILE};
use klio_config::overrides::parse_template_var;
use klio_config::{ConfigExporter, ConfigError, ConfigFormat, KlioConfig, LoadOptions, Override};
use klio_exec::{
    DataFilterPlan, ExecutionPlan, LocalExistenceCheck, MessageFlags, ProcessEnv, Route,
    RuntimeConfig, ToolVersions,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Validate, inspect and plan klio job documents"
)]
struct Cli {
    /// Path to the job document
    #[arg(short, long, global = true, env = "KLIO_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    /// Template variable for `${name}` placeholders, as name=value
    #[arg(short = 'T', long = "template", global = true, value_parser = template_var)]
    templates: Vec<(String, String)>,
    /// Replace a single value, as dotted.path=value. The value is read as a
    /// YAML scalar; quote it (job_name='"2024"') to keep it a string
    #[arg(short = 'O', long = "override", global = true, value_parser = override_arg)]
    overrides: Vec<Override>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check the document and print a short summary
    Validate,
    /// Print the normalized document
    Show {
        #[arg(long, value_enum, default_value_t = OutputFormat::Yaml)]
        format: OutputFormat,
    },
    /// Print the runner options, event transforms and data filters
    Plan {
        /// Tag for the worker image when the portable harness is enabled
        #[arg(long)]
        image_tag: Option<String>,
        #[arg(long)]
        direct_runner: bool,
        /// Override `pipeline_options.update`
        #[arg(long)]
        update: Option<bool>,
        #[arg(long)]
        blocking: bool,
        /// Print the plan as JSON instead of flags
        #[arg(long)]
        json: bool,
    },
    /// Decide what happens to one work item
    Route {
        element: String,
        #[arg(long)]
        ping: bool,
        #[arg(long)]
        force: bool,
        /// Local directory mirroring the configured buckets
        #[arg(long, default_value = ".")]
        mirror: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

fn template_var(raw: &str) -> Result<(String, String), ConfigError> {
    parse_template_var(raw)
}

fn override_arg(raw: &str) -> Result<Override, ConfigError> {
    Override::parse(raw)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let options = LoadOptions {
        templates: cli.templates.iter().cloned().collect(),
        overrides: cli.overrides.clone(),
    };
    let config = klio_config::load_with(&cli.config, &options)
        .with_context(|| format!("load job config {:?}", cli.config))?;

    match cli.command {
        Command::Validate => {
            print_summary(&config);
        }
        Command::Show { format } => {
            let bytes = match format {
                OutputFormat::Yaml => YamlExporter.export(&config, ConfigFormat::Yaml)?,
                OutputFormat::Json => JsonExporter.export(&config, ConfigFormat::Json)?,
            };
            println!("{}", String::from_utf8_lossy(&bytes).trim_end());
        }
        Command::Plan {
            image_tag,
            direct_runner,
            update,
            blocking,
            json,
        } => {
            let runtime = RuntimeConfig {
                image_tag,
                direct_runner,
                update,
                blocking,
                job_dir: job_dir(&cli.config)?,
            };
            let plan =
                ExecutionPlan::build(&config, &runtime, &ToolVersions::default(), &ProcessEnv)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&plan)?);
            } else {
                print_plan(&plan);
            }
        }
        Command::Route {
            element,
            ping,
            force,
            mirror,
        } => {
            let filters = DataFilterPlan::from_config(&config)?;
            let checker = LocalExistenceCheck::new(mirror);
            let route = filters.route(&element, MessageFlags { ping, force }, &checker)?;
            info!(element = %element, ?route, "routed work item");
            println!(
                "{}: {}",
                element,
                match route {
                    Route::Process => "process",
                    Route::PassThru => "pass through",
                    Route::Drop => "drop",
                }
            );
        }
    }
    Ok(())
}

fn job_dir(config_path: &Path) -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("read current directory")?;
    Ok(match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => cwd.join(parent),
        _ => cwd,
    })
}

fn print_summary(config: &KlioConfig) {
    let job = &config.job_config;
    println!("{} (version {})", config.job_name, config.version);
    println!(
        "  runner: {}{}",
        config.pipeline_options.runner,
        if config.is_streaming() { ", streaming" } else { ", batch" }
    );
    for input in job.event_inputs() {
        println!("  event input: {}", input.kind);
    }
    for input in job.data_inputs() {
        println!("  data input: {}/*{}", input.location, input.file_suffix);
    }
    for output in job.data_outputs() {
        println!("  data output: {}/*{}", output.location, output.file_suffix);
    }
}

fn print_plan(plan: &ExecutionPlan) {
    println!("{}", plan.job_name);
    for flag in plan.options.to_flags() {
        println!("  {}", flag);
    }
    for input in &plan.inputs {
        match input.transform {
            Some(transform) => println!("  {} -> {}", input.name, transform),
            None => println!("  {} -> (read by job)", input.name),
        }
        for step in &input.steps {
            println!("    {}", step);
        }
    }
    if let Some(output) = &plan.output {
        println!("  output -> {}", output.transform);
    }
}
