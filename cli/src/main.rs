//! Gravsearch CLI: compile Gravsearch queries to SPARQL from the command line
//!
//! Loads an ontology feed (JSON) and optional compiler configuration, then
//! prints the prequery, main query template, count query or inferred types.

use anyhow::Context;
use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table};
use gravsearch::{
    CompileRequest, GravsearchCompiler, GravsearchConfig, OntologyCache, OntologyFeed, PageRequest,
    VisibilityFilter,
};
use oxrdf::NamedNode;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "gravsearch", version, about = "Gravsearch query compiler CLI")]
struct Cli {
    /// Ontology feed (JSON)
    #[arg(long, global = true, env = "GRAVSEARCH_ONTOLOGY")]
    ontology: Option<PathBuf>,

    /// Compiler configuration (YAML or JSON)
    #[arg(long, global = true, env = "GRAVSEARCH_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "text", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Table,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile one page of a query into a prequery and main query
    Compile {
        /// Query text, or a file path with --file
        query: String,

        /// Treat the query argument as a file path
        #[arg(long)]
        file: bool,

        /// Page number, starting at 0
        #[arg(long, default_value_t = 0)]
        page: u64,

        /// Visibility fragment using $entity for the checked resource
        #[arg(long)]
        visibility: Option<String>,

        /// Main resource IRIs to fill into the main query
        #[arg(long = "main-iri")]
        main_iris: Vec<String>,
    },
    /// Compile the query counting all matching main resources
    Count {
        query: String,

        #[arg(long)]
        file: bool,

        #[arg(long)]
        visibility: Option<String>,
    },
    /// Show the types inferred for a query
    Inspect {
        query: String,

        #[arg(long)]
        file: bool,
    },
}

fn main() {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    let cli = Cli::parse();

    let result = build_compiler(cli.ontology.as_deref(), cli.config.as_deref()).and_then(|compiler| {
        match cli.command {
            Commands::Compile {
                query,
                file,
                page,
                visibility,
                main_iris,
            } => run_compile(&compiler, &read_query(&query, file)?, page, visibility, &main_iris, &cli.format),
            Commands::Count { query, file, visibility } => {
                run_count(&compiler, &read_query(&query, file)?, visibility, &cli.format)
            }
            Commands::Inspect { query, file } => run_inspect(&compiler, &read_query(&query, file)?, &cli.format),
        }
    });

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn build_compiler(ontology: Option<&Path>, config: Option<&Path>) -> anyhow::Result<GravsearchCompiler> {
    let feed = match ontology {
        Some(path) => OntologyFeed::from_file(path)
            .with_context(|| format!("failed to load ontology feed {}", path.display()))?,
        None => OntologyFeed::new(),
    };
    let config = match config {
        Some(path) => GravsearchConfig::from_file(path)
            .with_context(|| format!("failed to load configuration {}", path.display()))?,
        None => GravsearchConfig::default(),
    };
    let cache = OntologyCache::from_feed(&feed)?;
    Ok(GravsearchCompiler::new(Arc::new(cache), config))
}

fn read_query(query: &str, file: bool) -> anyhow::Result<String> {
    if file {
        std::fs::read_to_string(query).with_context(|| format!("failed to read query file {}", query))
    } else {
        Ok(query.to_string())
    }
}

fn visibility_filter(fragment: Option<String>) -> VisibilityFilter {
    fragment.map(VisibilityFilter::new).unwrap_or_default()
}

fn run_compile(
    compiler: &GravsearchCompiler,
    query: &str,
    page: u64,
    visibility: Option<String>,
    main_iris: &[String],
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let request = CompileRequest::new(visibility_filter(visibility)).with_page(PageRequest::page(page));
    let compiled = compiler.compile(query, &request)?;

    let iris = main_iris
        .iter()
        .map(|iri| NamedNode::new(iri.as_str()).with_context(|| format!("invalid main resource IRI {}", iri)))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let main_query = if iris.is_empty() {
        compiled.main_query.text().to_string()
    } else {
        compiled.main_query.instantiate(&iris)
    };

    match format {
        OutputFormat::Json => {
            let columns: Vec<String> = compiled.prequery_variables.iter().map(ToString::to_string).collect();
            let output = serde_json::json!({
                "mainResource": compiled.main_resource.to_string(),
                "prequeryVariables": columns,
                "prequery": compiled.prequery,
                "mainQuery": main_query,
                "placeholder": compiled.main_query.placeholder(),
                "ontologyGeneration": compiled.ontology_generation,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["Query", "SPARQL"]);
            table.add_row(vec!["prequery".to_string(), compiled.prequery]);
            table.add_row(vec!["main".to_string(), main_query]);
            println!("{}", table);
        }
        OutputFormat::Text => {
            println!("# Prequery (main resource {})", compiled.main_resource);
            println!("{}", compiled.prequery);
            println!("# Main query");
            println!("{}", main_query);
        }
    }

    Ok(())
}

fn run_count(
    compiler: &GravsearchCompiler,
    query: &str,
    visibility: Option<String>,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let count = compiler.compile_count(query, &visibility_filter(visibility))?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "countQuery": count }))?);
        }
        _ => println!("{}", count),
    }

    Ok(())
}

fn run_inspect(compiler: &GravsearchCompiler, query: &str, format: &OutputFormat) -> anyhow::Result<()> {
    let annotated = compiler.inspect_types(query)?;
    let namespaces = compiler.config().namespaces();
    let json = annotated.types.to_json(Some(&namespaces));

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Table | OutputFormat::Text => {
            let entities = json["entities"].as_array().cloned().unwrap_or_default();
            if entities.is_empty() {
                println!("(no typed entities)");
                return Ok(());
            }

            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["Entity", "Kind", "Type"]);
            for entity in &entities {
                table.add_row(vec![
                    format_json_value(&entity["entity"]),
                    format_json_value(&entity["kind"]),
                    format_json_value(&entity["type"]),
                ]);
            }

            println!("{}", table);
            println!("{} entity(ies)", entities.len());
        }
    }

    Ok(())
}

fn format_json_value(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => "null".to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}
