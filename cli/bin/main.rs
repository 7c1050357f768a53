use std::path::PathBuf;

use clap::Parser;

use stplc_cli::cli::{self, RunArgs};
use stplc_cli::logger;

#[derive(Parser, Debug)]
#[command(name = "stplc", about = "Structured Text interpreter")]
struct Args {
    /// Turn on verbose logging. Repeat to increase the verbosity.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Write log messages to the file instead of standard error.
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    action: Action,
}

#[derive(clap::Args, Debug)]
struct Execution {
    /// Source files or directories of source files.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Name of the program to start.
    #[arg(short, long)]
    program: String,

    /// Query to evaluate after running, such as `P.x` or `P.x := 1`.
    #[arg(short, long = "query")]
    queries: Vec<String>,

    /// Abandon a cycle after this many micro-steps.
    #[arg(long)]
    max_micro_steps: Option<u64>,

    /// Link even when the sources contain invalid tokens.
    #[arg(long)]
    resolve_links_on_parse_error: bool,
}

impl Execution {
    fn into_run_args(self, cycles: u32) -> (Vec<PathBuf>, RunArgs) {
        (
            self.files,
            RunArgs {
                program: self.program,
                cycles,
                queries: self.queries,
                max_micro_steps: self.max_micro_steps,
                resolve_links_on_parse_error: self.resolve_links_on_parse_error,
            },
        )
    }
}

#[derive(clap::Subcommand, Debug)]
enum Action {
    /// Check that the files parse and link.
    Check { files: Vec<PathBuf> },
    /// Write the tokens of the files.
    Tokenize { files: Vec<PathBuf> },
    /// Run a program for a number of cycles.
    Run {
        #[command(flatten)]
        execution: Execution,

        /// Number of cycles to run.
        #[arg(short, long, default_value_t = 1)]
        cycles: u32,
    },
    /// Run one cycle of a program a statement at a time.
    Step {
        #[command(flatten)]
        execution: Execution,

        /// Also stop at statements of called functions and function blocks.
        #[arg(long)]
        into_calls: bool,
    },
}

pub fn main() -> Result<(), String> {
    let args = Args::parse();

    logger::configure(args.verbose, args.log_file)?;

    match args.action {
        Action::Check { files } => cli::check(files, false),
        Action::Tokenize { files } => cli::tokenize(files, false).map(|_| ()),
        Action::Run { execution, cycles } => {
            let (files, run_args) = execution.into_run_args(cycles);
            cli::run(files, &run_args, false).map(|_| ())
        }
        Action::Step {
            execution,
            into_calls,
        } => {
            let (files, run_args) = execution.into_run_args(0);
            cli::step(files, &run_args, into_calls, false).map(|_| ())
        }
    }
}
