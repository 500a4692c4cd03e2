mod args;
use args::{parse_args, Commands};

mod core;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let command = parse_args();

    match command {
        Commands::Workloads => core::workloads(),
        Commands::Run {
            input,
            workload,
            output,
            threads,
            args,
        } => core::run(input, workload, output, threads, args)?,
    }

    Ok(())
}
