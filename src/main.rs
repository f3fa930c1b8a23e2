//! ontoindex CLI entry point

use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ontoindex::cli::{Cli, Commands, OutputFormat};
use ontoindex::{DomainContext, Indexer, OntoConfig, OntoError};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "ontoindex=debug" } else { "ontoindex=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(&cli).await {
        Ok(output) => {
            print!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            e.downcast_ref::<OntoError>()
                .map(OntoError::exit_code)
                .unwrap_or(ExitCode::FAILURE)
        }
    }
}

async fn run(cli: &Cli) -> Result<String> {
    let project = cli.command.project();
    let root = project.path.canonicalize().unwrap_or_else(|_| project.path.clone());
    let config = match &project.config {
        Some(path) => OntoConfig::load_file(path)?,
        None => OntoConfig::load(&root),
    };
    let indexer = Indexer::new(config);

    let output = match &cli.command {
        Commands::Build(_) => {
            let report = indexer.build(&root).await?;
            render(cli.format, &report, |r| r.to_text())?
        }
        Commands::Refresh(_) => {
            let report = indexer.refresh(&root).await?;
            render(cli.format, &report, |r| r.to_text())?
        }
        Commands::Status(_) => {
            let status = indexer.status(&root)?;
            render(cli.format, &status, |s| s.to_text())?
        }
        Commands::Context(_) => {
            let context = indexer.domain_context(&root)?;
            render(cli.format, &context, |c| context_text(&root, c))?
        }
    };
    Ok(output)
}

fn render<T: serde::Serialize>(format: OutputFormat, value: &T, text: impl Fn(&T) -> String) -> Result<String> {
    Ok(match format {
        OutputFormat::Text => text(value),
        OutputFormat::Json => {
            let mut json = serde_json::to_string_pretty(value)?;
            json.push('\n');
            json
        }
    })
}

fn context_text(root: &Path, ctx: &DomainContext) -> String {
    let mut out = format!("project: {}\n", root.display());
    let sections: [(&str, &[String]); 11] = [
        ("tree", &ctx.tree_preview),
        ("entry_points", &ctx.entry_points),
        ("dependencies", &ctx.dependency_names),
        ("exported", &ctx.exported_signatures),
        ("classes", &ctx.class_signatures),
        ("interfaces", &ctx.interface_signatures),
        ("schemas", &ctx.schema_signatures),
        ("relations", &ctx.module_relations),
        ("test_files", &ctx.test_files),
        ("tested_symbols", &ctx.test_symbols),
        ("docs", &ctx.doc_files),
    ];
    for (label, items) in sections {
        if items.is_empty() {
            continue;
        }
        out.push_str(&format!("\n{}[{}]:\n", label, items.len()));
        for item in items {
            out.push_str(&format!("  {}\n", item));
        }
    }
    if let Some(manifest) = &ctx.manifest_excerpt {
        out.push_str("\nmanifest:\n");
        for line in manifest.lines() {
            out.push_str(&format!("  {}\n", line));
        }
    }
    out
}
