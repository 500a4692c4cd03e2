use clap::{Parser, Subcommand};

//
// For parsing the user specified command.
//
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the workloads this binary can run.
    Workloads,
    /// Run a workload over local input files.
    Run {
        /// Glob spec for the input files
        #[arg(short, long)]
        input: String,

        /// Name of the workload
        #[arg(short, long)]
        workload: String,

        /// Output file path
        #[arg(short, long)]
        output: String,

        /// Number of worker threads
        #[arg(short, long, default_value_t = 4)]
        threads: usize,

        /// Auxiliary arguments to pass to the MapReduce application.
        #[clap(value_parser, last = true)]
        args: Vec<String>,
    },
}

/// Parse the user command.
pub fn parse_args() -> Commands {
    Args::parse().command
}
