//! Assembly Archiver CLI
//!
//! Entry point for the `assemble` command-line tool.

use assembly_archiver::archive::AddOperation;
use assembly_archiver::config::{project_config_path, set_path, user_config_path};
use assembly_archiver::model::{load_reactor, AssemblyDescriptor, Project};
use assembly_archiver::{
    parse_formats, AssemblyArchiver, AssemblyConfig, AssemblyError, Collaborators, EffectiveConfig,
    Settings, TracingDiagnostics,
};
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "assemble")]
#[command(about = "Build distribution archives from an assembly descriptor", version)]
struct Cli {
    /// Log more (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct AssemblyArgs {
    /// Path to the assembly descriptor
    #[arg(long, short = 'd', default_value = "assembly.toml")]
    descriptor: PathBuf,

    /// Path to the root project file
    #[arg(long, short = 'p', default_value = "project.toml")]
    project: PathBuf,

    /// Archive formats to write (comma-separated, overrides the descriptor)
    #[arg(long, short = 'f', value_delimiter = ',')]
    format: Vec<String>,

    /// Output directory for finished archives
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Local artifact repository (default: ~/.m2/repository)
    #[arg(long)]
    local_repository: Option<PathBuf>,

    /// Override the distribution base name
    #[arg(long)]
    final_name: Option<String>,

    /// Do not append the assembly id to the distribution name
    #[arg(long)]
    no_assembly_id: bool,

    /// Set a property for interpolation (KEY=VALUE, repeatable)
    #[arg(short = 'D', value_name = "KEY=VALUE")]
    define: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble and write the archives
    Build {
        #[command(flatten)]
        args: AssemblyArgs,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Print the add-operations without writing an archive
    Plan {
        #[command(flatten)]
        args: AssemblyArgs,
    },

    /// Validate the descriptor and project model
    Verify {
        #[command(flatten)]
        args: AssemblyArgs,
    },

    /// Print the effective configuration with provenance
    Config {
        #[command(flatten)]
        args: AssemblyArgs,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Build { args, json } => run_build(&args, json),
        Commands::Plan { args } => run_plan(&args),
        Commands::Verify { args } => run_verify(&args),
        Commands::Config { args } => run_config(&args),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("assembly_archiver={}", level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();
}

/// Everything a command needs after loading inputs.
struct Loaded {
    descriptor: AssemblyDescriptor,
    settings: Settings,
    config: AssemblyConfig,
}

fn fail(err: AssemblyError) -> ! {
    eprintln!("{} error: {}", err.kind().as_str(), err);
    process::exit(err.exit_code());
}

fn cli_overrides(args: &AssemblyArgs) -> Result<Option<Value>, AssemblyError> {
    let mut overrides = json!({});
    let mut any = false;

    if !args.format.is_empty() {
        set_path(&mut overrides, "formats", json!(args.format));
        any = true;
    }
    if let Some(ref output) = args.output {
        set_path(&mut overrides, "output_directory", json!(output));
        any = true;
    }
    if let Some(ref repo) = args.local_repository {
        set_path(&mut overrides, "local_repository", json!(repo));
        any = true;
    }
    if let Some(ref name) = args.final_name {
        set_path(&mut overrides, "final_name", json!(name));
        any = true;
    }
    if args.no_assembly_id {
        set_path(&mut overrides, "append_assembly_id", json!(false));
        any = true;
    }
    for define in &args.define {
        let Some((key, value)) = define.split_once('=') else {
            return Err(AssemblyError::configuration(format!(
                "Invalid property '{}': expected KEY=VALUE",
                define
            )));
        };
        if key.is_empty() {
            return Err(AssemblyError::configuration(format!(
                "Invalid property '{}': empty key",
                define
            )));
        }
        // Keys may contain dots, so insert directly instead of via set_path.
        if let Some(props) = overrides
            .as_object_mut()
            .map(|root| root.entry("properties").or_insert_with(|| json!({})))
            .and_then(Value::as_object_mut)
        {
            props.insert(key.to_string(), json!(value));
        }
        any = true;
    }

    Ok(any.then_some(overrides))
}

fn effective_config(args: &AssemblyArgs, basedir: &Path) -> Result<EffectiveConfig, AssemblyError> {
    let user = user_config_path();
    let project = project_config_path(basedir);
    Ok(EffectiveConfig::build(
        user.as_deref(),
        Some(project.as_path()),
        cli_overrides(args)?,
    )?)
}

fn project_basedir(project_file: &Path) -> PathBuf {
    match project_file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn load(args: &AssemblyArgs) -> Result<Loaded, AssemblyError> {
    let descriptor = AssemblyDescriptor::from_file(&args.descriptor)?;
    let reactor = load_reactor(&args.project)?;

    let basedir = reactor
        .first()
        .map(|p| p.basedir.clone())
        .unwrap_or_else(|| project_basedir(&args.project));
    let settings = effective_config(args, &basedir)?.settings()?;

    let config = AssemblyConfig::from_settings(&settings, reactor).ok_or_else(|| {
        AssemblyError::configuration(format!(
            "No project found in {}",
            args.project.display()
        ))
    })?;

    Ok(Loaded {
        descriptor,
        settings,
        config,
    })
}

fn archiver_for(config: &AssemblyConfig) -> AssemblyArchiver {
    let diagnostics = TracingDiagnostics::shared();
    AssemblyArchiver::standard(
        Collaborators::for_config(config, diagnostics.clone()),
        diagnostics,
    )
}

fn run_build(args: &AssemblyArgs, json_output: bool) {
    let loaded = load(args).unwrap_or_else(|e| fail(e));
    let formats = parse_formats(&loaded.settings.formats_for(&loaded.descriptor.formats))
        .unwrap_or_else(|e| fail(e));

    let written = archiver_for(&loaded.config)
        .create_archives(&loaded.descriptor, &loaded.config, &formats)
        .unwrap_or_else(|e| fail(e));

    if json_output {
        let summary: Vec<Value> = written
            .iter()
            .map(|w| {
                json!({
                    "format": w.format.as_str(),
                    "path": w.path,
                    "manifest": w.manifest_path,
                    "sha256": w.sha256,
                    "entries": w.manifest.entries.len(),
                })
            })
            .collect();
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(1);
            }
        }
    } else {
        for archive in &written {
            println!(
                "{:<7} {} ({} entries, sha256 {})",
                archive.format.as_str(),
                archive.path.display(),
                archive.manifest.entries.len(),
                archive.sha256
            );
        }
    }
}

fn run_plan(args: &AssemblyArgs) {
    let loaded = load(args).unwrap_or_else(|e| fail(e));
    let recorder = archiver_for(&loaded.config)
        .plan(&loaded.descriptor, &loaded.config)
        .unwrap_or_else(|e| fail(e));

    let operations: &[AddOperation] = recorder.operations();
    match serde_json::to_string_pretty(operations) {
        Ok(text) => println!("{}", text),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            process::exit(1);
        }
    }
}

fn run_verify(args: &AssemblyArgs) {
    let loaded = load(args).unwrap_or_else(|e| fail(e));
    let descriptor = &loaded.descriptor;
    if descriptor.is_empty() {
        fail(AssemblyError::configuration(format!(
            "Assembly '{}' has nothing to add",
            descriptor.id
        )));
    }
    let formats = parse_formats(&loaded.settings.formats_for(&descriptor.formats))
        .unwrap_or_else(|e| fail(e));

    println!("Descriptor valid: {}", args.descriptor.display());
    println!();
    println!("  Assembly: {}", descriptor.id);
    println!(
        "  Distribution: {}",
        loaded.config.distribution_name(&descriptor.id)
    );
    println!(
        "  Formats: {}",
        formats
            .iter()
            .map(|f| f.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    print_count("Dependency sets", descriptor.dependency_sets.len());
    print_count("File sets", descriptor.file_sets.len());
    print_count("Files", descriptor.files.len());
    print_count("Module sets", descriptor.module_sets.len());
    print_count("Repositories", descriptor.repositories.len());
    println!(
        "  Reactor: {}",
        loaded
            .config
            .reactor_projects
            .iter()
            .map(Project::id)
            .collect::<Vec<_>>()
            .join(", ")
    );
}

fn print_count(label: &str, count: usize) {
    if count > 0 {
        println!("  {}: {}", label, count);
    }
}

fn run_config(args: &AssemblyArgs) {
    let basedir = project_basedir(&args.project);
    let effective = effective_config(args, &basedir).unwrap_or_else(|e| fail(e));
    match effective.to_json() {
        Ok(text) => println!("{}", text),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            process::exit(1);
        }
    }
}
