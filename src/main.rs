use std::io::Write;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cfgraph::query_parser::{parse_query, with_default_return};
use cfgraph::{BuildOptions, Context, DeviceType, ElementTree, IdScoping, TracingSink};

#[derive(Clone, Copy, clap::ValueEnum)]
enum Format {
    Table,
    Json,
}

#[derive(Parser)]
#[command(name = "cfgraph", about = "Query a firewall configuration as a graph")]
struct Cli {
    /// Configuration document as a JSON element tree (reads from stdin if not provided)
    file: Option<std::path::PathBuf>,

    /// Query, e.g. "MATCH (r:security-rule) WHERE r.disabled == 'yes' RETURN r.name"
    #[arg(long, short = 'q')]
    query: String,

    /// firewall or panorama
    #[arg(long, default_value = "firewall")]
    device_type: DeviceType,

    /// auto, shared, device-group:NAME, vsys:NAME or template:NAME
    #[arg(long, short = 'c', default_value = "auto")]
    context: Context,

    /// Configuration schema version
    #[arg(long, default_value = "10.1")]
    version: String,

    /// Do not qualify node ids with their device group
    #[arg(long)]
    collapse_ids: bool,

    #[arg(long, short = 'f', value_enum, default_value = "table")]
    format: Format,
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("ERROR: {message}");
    std::process::exit(1);
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("CFGRAPH_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let text = with_default_return(&cli.query);
    let ast = parse_query(&text).unwrap_or_else(|e| fail(e));

    let document = match &cli.file {
        Some(path) => std::fs::File::open(path)
            .map_err(cfgraph::DocumentError::from)
            .and_then(ElementTree::from_reader)
            .unwrap_or_else(|e| fail(format_args!("failed to read {}: {e}", path.display()))),
        None => ElementTree::from_reader(std::io::stdin().lock())
            .unwrap_or_else(|e| fail(format_args!("failed to read stdin: {e}"))),
    };

    let options = BuildOptions {
        device_type: cli.device_type,
        context: cli.context,
        version: cli.version,
        id_scoping: if cli.collapse_ids {
            IdScoping::Collapsed
        } else {
            IdScoping::Qualified
        },
    };
    let mut sink = TracingSink::new();
    let graph = cfgraph::build_graph(&document, &options, &mut sink);
    tracing::info!(
        nodes = graph.node_count(),
        diagnostics = sink.emitted(),
        "graph ready"
    );

    let rows = cfgraph::query_executor::execute(&ast, &graph);
    let output = match cli.format {
        Format::Table => cfgraph::table::render_table(&ast.column_labels(), &rows),
        Format::Json => serde_json::to_string_pretty(&rows).unwrap_or_else(|e| fail(e)),
    };

    let mut stdout = std::io::stdout().lock();
    if let Err(e) = writeln!(stdout, "{output}") {
        fail(format_args!("failed to write output: {e}"));
    }
}
