use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use jcpa::analysis::cfa::{CfaBuilder, JvmCfa};
use jcpa::analysis::jvm::heap::HeapModel;
use jcpa::analysis::taint::{DEFAULT_MAX_TRACES_PER_ENDPOINT, TaintAnalyzer, TaintSpecification};
use jcpa::bytecode::{ClassPool, MethodSignature};
use jcpa::CpaError;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Analysis defaults, stored between runs.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
struct JcpaConfig {
    pub heap_model: HeapModel,
    pub max_call_stack_depth: i32,
    pub reduce_heap: bool,
}

impl Default for JcpaConfig {
    fn default() -> Self {
        Self {
            heap_model: HeapModel::Forgetful,
            max_call_stack_depth: -1,
            reduce_heap: false,
        }
    }
}

impl JcpaConfig {
    /// The stored defaults, overridden by whatever was given on the command line.
    fn merged(self, params: &JcpaParams) -> Self {
        Self {
            heap_model: params.heap_model.unwrap_or(self.heap_model),
            max_call_stack_depth: params
                .max_call_stack_depth
                .unwrap_or(self.max_call_stack_depth),
            reduce_heap: params.reduce_heap.unwrap_or(self.reduce_heap),
        }
    }
}

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct JcpaParams {
    #[command(subcommand)]
    pub command: Commands,
    #[arg(long, value_enum)]
    pub heap_model: Option<HeapModel>,
    /// Negative for no limit
    #[arg(long, allow_negative_numbers = true)]
    pub max_call_stack_depth: Option<i32>,
    #[arg(long)]
    pub reduce_heap: Option<bool>,
    /// Store the effective analysis settings as the new defaults
    #[arg(long)]
    pub save: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Runs a taint analysis and prints the tainted sink inputs
    Taint {
        /// Class pool, as JSON
        classes: PathBuf,
        /// Sources and sinks, as JSON
        specification: PathBuf,
        /// Entry method, as `Lclass;name(args)ret`
        main: String,
        /// Also print the source-to-sink traces
        #[arg(long)]
        traces: bool,
        /// Traces printed per endpoint, 0 for all
        #[arg(long, default_value_t = DEFAULT_MAX_TRACES_PER_ENDPOINT)]
        max_traces: usize,
    },
    /// Prints the control flow automaton of one or all methods
    Cfa {
        classes: PathBuf,
        method: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let params = JcpaParams::parse();
    let stored: JcpaConfig = confy::load("jcpa", None).context("loading configuration")?;
    let config = stored.merged(&params);
    if params.save {
        confy::store("jcpa", None, &config).context("storing configuration")?;
    }
    match params.command {
        Commands::Taint {
            classes,
            specification,
            main,
            traces,
            max_traces,
        } => {
            let max_traces = traces.then_some(max_traces);
            taint(&config, &classes, &specification, &main, max_traces)
        }
        Commands::Cfa { classes, method } => print_cfa(&classes, method.as_deref()),
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> anyhow::Result<T> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing {}", path.display()))
}

fn load_cfa(classes: &Path) -> anyhow::Result<(ClassPool, JvmCfa)> {
    let pool: ClassPool = read_json(classes)?;
    let cfa = CfaBuilder::new(&pool).build()?;
    Ok((pool, cfa))
}

fn taint(
    config: &JcpaConfig,
    classes: &Path,
    specification: &Path,
    main: &str,
    traces: Option<usize>,
) -> anyhow::Result<()> {
    let (pool, cfa) = load_cfa(classes)?;
    let spec: TaintSpecification = read_json(specification)?;
    let main: MethodSignature = main.parse()?;
    match pool.method(&main) {
        None => bail!(CpaError::UnknownMethod(main)),
        Some(m) if !m.has_code() => bail!(CpaError::NoCode(main)),
        Some(_) => {}
    }
    let result = TaintAnalyzer::builder()
        .cfa(&cfa)
        .main_signature(main)
        .sources(spec.sources)
        .sinks(spec.sinks)
        .heap_model(config.heap_model)
        .max_call_stack_depth(config.max_call_stack_depth)
        .reduce_heap(config.reduce_heap)
        .max_traces_per_endpoint(traces.filter(|max| *max > 0))
        .build()?
        .analyze()?;
    if result.aborted() {
        tracing::warn!("analysis was aborted, results are incomplete");
    }
    for (endpoint, sinks) in result.endpoint_sinks() {
        let sources = result
            .endpoint_taints()
            .get(endpoint)
            .map(|t| t.iter().map(|s| s.signature.fqn()).collect::<Vec<_>>())
            .unwrap_or_default();
        let sinks: Vec<String> = sinks.iter().map(|s| s.signature.fqn()).collect();
        println!("{endpoint}: {} <- {}", sinks.join(", "), sources.join(", "));
    }
    if traces.is_some() {
        for trace in result.extract_linear_traces() {
            println!("{}", serde_json::to_string_pretty(&trace.render())?);
        }
    }
    Ok(())
}

fn print_cfa(classes: &Path, method: Option<&str>) -> anyhow::Result<()> {
    let (_, cfa) = load_cfa(classes)?;
    let methods: Vec<MethodSignature> = match method {
        Some(m) => vec![m.parse()?],
        None => cfa.methods().map(|m| m.signature).collect(),
    };
    for signature in methods {
        if !cfa.contains_method(&signature) {
            bail!(CpaError::UnknownMethod(signature));
        }
        println!("{signature}");
        for node in cfa.function_nodes(&signature) {
            for edge in cfa.outgoing(node) {
                println!("  {} -> {}: {:?}", edge.source, edge.target, edge.edge.instruction);
            }
        }
    }
    Ok(())
}
