//! `nanocc` command-line driver.

use clap::Parser as ClapParser;
use nanocc::ast::dump;
use nanocc::{parse_source, generate, CompilerConfig, Target};
use std::fs;
use std::path::PathBuf;
use std::process;

#[derive(ClapParser)]
#[command(name = "nanocc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Ahead-of-time compiler for a small C-like subset", long_about = None)]
struct Cli {
    /// Input source file
    input: PathBuf,

    /// Output assembly path (defaults to the input stem with a .s extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Backend target: nasm or aarch64
    #[arg(short, long, default_value = "nasm")]
    target: String,

    /// Pretty-print the AST as an indented tree to stderr before codegen
    #[arg(short = 'a', long)]
    dump_ast: bool,

    /// Pretty-print the AST as a single-line S-expression to stderr
    #[arg(short = 'A', long)]
    dump_ast_compacted: bool,

    /// Raise the log level; repeat for more detail (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> nanocc::Result<PathBuf> {
    let Some(target) = Target::parse(&cli.target) else {
        eprintln!("unknown target '{}', expected 'nasm' or 'aarch64'", cli.target);
        process::exit(1);
    };

    let mut config = CompilerConfig::new(target)
        .with_dump_ast(cli.dump_ast)
        .with_dump_ast_compacted(cli.dump_ast_compacted);
    if let Some(output) = &cli.output {
        config = config.with_output(output.clone());
    }

    let source = fs::read_to_string(&cli.input)?;
    let program = parse_source(source)?;

    if config.dump_ast {
        for func in &program.functions {
            eprintln!("{}", dump::dump_tree(func));
        }
    }
    if config.dump_ast_compacted {
        for func in &program.functions {
            eprintln!("{}", dump::dump_compact(func));
        }
    }

    let asm = generate(program, &config)?;
    let output_path = config.output_path(&cli.input);
    fs::write(&output_path, asm)?;
    Ok(output_path)
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(output_path) => {
            println!("{} -> {}", cli.input.display(), output_path.display());
        }
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    }
}
