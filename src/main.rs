//! infotpl CLI
//!
//! Usage:
//!   infotpl [OPTIONS] [FILE]
//!
//! Options:
//!   -c, --context <KEY=VALUE>  Named context value (repeatable)
//!   -C, --config <FILE>        Render configuration (TOML format)
//!       --check                Only parse the template
//!       --ast                  Print the parsed template
//!       --dump-docs            Print the registered kinds and mappings as JSON
//!   -v, --verbose              Increase log verbosity
//!   -h, --help                 Print help

use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use clap::Parser;
use env_logger::Env;

use infotpl::{doc, Engine, Indices, Registries, RenderConfig, RenderError, Value};

#[derive(Parser)]
#[command(name = "infotpl")]
#[command(about = "Render templates by resolving placeholder chains against typed mappings")]
struct Cli {
    /// Template file (reads from stdin if not provided)
    input: Option<PathBuf>,

    /// Named context value, e.g. `name=steve` or `count=3`
    #[arg(short, long = "context", value_name = "KEY=VALUE", value_parser = parse_context)]
    context: Vec<(String, Value)>,

    /// Render configuration file (TOML format)
    #[arg(short = 'C', long)]
    config: Option<PathBuf>,

    /// Only parse the template and report syntax errors
    #[arg(long)]
    check: bool,

    /// Print the parsed template
    #[arg(long)]
    ast: bool,

    /// Print the registered kinds and mappings as JSON
    #[arg(long)]
    dump_docs: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Values that look like booleans or numbers are passed as such
fn parse_context(arg: &str) -> Result<(String, Value), String> {
    let (key, raw) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{}`", arg))?;
    let value = match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => match raw.parse::<f64>() {
            Ok(n) if n.is_finite() => Value::Number(n),
            _ => Value::String(raw.to_string()),
        },
    };
    Ok((key.to_string(), value))
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    let indices = match Indices::with_defaults(Registries::new()) {
        Ok(indices) => indices,
        Err(e) => {
            eprintln!("Error registering defaults: {}", e);
            std::process::exit(1);
        }
    };

    if cli.dump_docs {
        let docs = doc::export_layers(indices.layers());
        match serde_json::to_string_pretty(&docs) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing documentation: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    // If no input file and stdin is a terminal (interactive), show intro help
    if cli.input.is_none() && io::stdin().is_terminal() {
        print_intro();
        return;
    }

    let config = match &cli.config {
        Some(path) => match RenderConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error loading config '{}': {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => RenderConfig::default(),
    };

    let (source, filename) = match &cli.input {
        Some(path) => match fs::read_to_string(path) {
            Ok(content) => (content, path.display().to_string()),
            Err(e) => {
                eprintln!("Error reading file '{}': {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => {
            let mut buffer = String::new();
            match io::stdin().read_to_string(&mut buffer) {
                Ok(_) => (buffer, "<stdin>".to_string()),
                Err(e) => {
                    eprintln!("Error reading from stdin: {}", e);
                    std::process::exit(1);
                }
            }
        }
    };
    // A trailing newline from files or echo is not part of the template
    let source = source.strip_suffix('\n').unwrap_or(&source);

    let engine = Engine::new(indices).with_config(config);

    if cli.check || cli.ast {
        match engine.parse(source) {
            Ok(template) => {
                if cli.ast {
                    println!("{:#?}", template);
                }
            }
            Err(e) => {
                eprint!("{}", e.format(source, &filename));
                std::process::exit(1);
            }
        }
        return;
    }

    let context: Vec<(&str, Value)> = cli
        .context
        .iter()
        .map(|(key, value)| (key.as_str(), value.clone()))
        .collect();
    match engine.render_named(source, &context, None) {
        Ok(text) => println!("{}", text),
        Err(RenderError::Parse(e)) => {
            eprint!("{}", e.format(source, &filename));
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn print_intro() {
    println!(
        r#"infotpl - type-directed template rendering

USAGE:
    infotpl [OPTIONS] [FILE]
    echo '<template>' | infotpl -c key=value

OPTIONS:
    -c, --context     Named context value, KEY=VALUE (repeatable)
    -C, --config      Render configuration (TOML file)
    --check           Only parse the template
    --ast             Print the parsed template
    --dump-docs       Print registered kinds and mappings as JSON
    -v, --verbose     Increase log verbosity
    -h, --help        Print help

QUICK START:
    echo 'Hello {{name upper}}, {{n add(2)}}' | infotpl -c name=steve -c n=1

Placeholders name a chain of mappings applied to a context value;
alternatives are separated by `|`. Literal braces are written `{{{{` and `}}}}`."#
    );
}
