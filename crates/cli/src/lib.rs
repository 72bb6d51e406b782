//! `confpp` command-line front end.
use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgAction, Parser};
use confpp::options::{DEFAULT_MAX_DEPTH, DEFAULT_MAX_ITERATIONS};
use confpp::{DEFAULT_NAMESPACE, Options, Preprocessor, Whitespace};
use confpp_xml::{WriteOptions, document_to_string};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use url::Url;

pub mod util;

#[derive(Parser, Debug, Clone)]
#[command(name = "confpp", version, about = "Expand preprocessor directives in XML configuration files")]
pub struct Cli {
    /// Input document; `-` or nothing reads standard input.
    #[arg(value_name = "INPUT")]
    pub input: Option<PathBuf>,
    /// Write the result here instead of standard output.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
    /// Predefine a text symbol.
    #[arg(short = 'D', long = "define", value_name = "NAME=VALUE", value_parser = util::parse_definition)]
    pub definitions: Vec<(String, String)>,
    /// Namespace URI of directive elements.
    #[arg(long, value_name = "URI", default_value = DEFAULT_NAMESPACE)]
    pub namespace: String,
    /// Keep whitespace-only text nodes.
    #[arg(long)]
    pub preserve_whitespace: bool,
    /// Indent output by N spaces per level.
    #[arg(long, value_name = "N")]
    pub indent: Option<usize>,
    /// Omit the XML declaration.
    #[arg(long)]
    pub no_declaration: bool,
    #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_DEPTH)]
    pub max_depth: usize,
    #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_ITERATIONS)]
    pub max_iterations: usize,
    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn options(&self) -> Options {
        let whitespace = if self.preserve_whitespace { Whitespace::Preserve } else { Whitespace::Collapse };
        self.definitions.iter().fold(
            Options::new()
                .with_namespace(self.namespace.clone())
                .with_whitespace(whitespace)
                .with_max_depth(self.max_depth)
                .with_max_iterations(self.max_iterations),
            |options, (name, value)| options.with_definition(name.clone(), value.clone()),
        )
    }

    pub fn write_options(&self) -> WriteOptions {
        WriteOptions::default().with_indent(self.indent).with_declaration(!self.no_declaration)
    }
}

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    execute(&cli)
}

/// Preprocesses the configured input and writes the result.
pub fn execute(cli: &Cli) -> anyhow::Result<()> {
    let output = render(cli)?;
    util::write_output(cli.output.as_deref(), &output)
}

/// Preprocessed document as text.
pub fn render(cli: &Cli) -> anyhow::Result<String> {
    let preprocessor = Preprocessor::new(cli.options());
    let document = match cli.input.as_deref().filter(|p| p.as_os_str() != "-") {
        Some(path) => {
            util::ensure_readable(path)?;
            debug!(path = %path.display(), "reading input file");
            preprocessor.process_file(path).with_context(|| format!("failed to preprocess {}", path.display()))?
        }
        None => {
            let text = util::read_stdin()?;
            let base = std::env::current_dir().ok().and_then(|dir| Url::from_directory_path(dir).ok());
            preprocessor.process_str(&text, base).context("failed to preprocess standard input")?
        }
    };
    let mut text = document_to_string(&document, &cli.write_options())?;
    if !text.ends_with('\n') {
        text.push('\n');
    }
    Ok(text)
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).with_target(false).try_init();
}
