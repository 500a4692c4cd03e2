use std::fs;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};
use bytes::Bytes;
use glob::glob;
use itertools::Itertools;
use tracing::info;

use mrt_engine::Job;
use workload::{InputRecord, NamedWorkload};

const PROGRESS_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Print the names of the available workloads.
pub fn workloads() {
    println!("[Workloads]");
    for name in workload::names() {
        println!("{name}");
    }
}

/// Run `workload` over every file matching `input`, writing one
/// `key value` line per output record to `output`.
pub fn run(
    input: String,
    workload: String,
    output: String,
    threads: usize,
    aux: Vec<String>,
) -> Result<()> {
    let named = workload::try_named(&workload, &aux)
        .ok_or_else(|| anyhow!("The workload `{}` is not a known workload", workload))?;

    let records = collect_input(&input)?;
    info!(
        "Collected {} input files for workload `{}`",
        records.len(),
        workload
    );

    let job = Job::start(named, records, threads);
    watch_job(&job);

    let results = job.into_output();
    info!("Job produced {} output records", results.len());

    write_output(&output, results)?;
    info!("Results written to {}", output);

    Ok(())
}

/// Read every file matching the glob spec into an input record.
fn collect_input(spec: &str) -> Result<Vec<InputRecord>> {
    let mut records = Vec::new();
    for entry in glob(spec)? {
        let path = entry?;
        if !path.is_file() {
            continue;
        }
        let contents = fs::read(&path)?;
        records.push((
            Bytes::from(path.display().to_string()),
            Bytes::from(contents),
        ));
    }
    if records.is_empty() {
        return Err(anyhow!("no input files match `{}`", spec));
    }
    Ok(records)
}

/// Follow the job to completion, reporting stage and percentage.
fn watch_job(job: &Job<NamedWorkload>) {
    let done = AtomicBool::new(false);
    thread::scope(|scope| {
        scope.spawn(|| {
            while !done.load(Ordering::SeqCst) {
                let status = job.status();
                info!("stage {:?} at {:.0}%", status.stage, status.progress);
                thread::sleep(PROGRESS_POLL_INTERVAL);
            }
        });
        job.wait();
        done.store(true, Ordering::SeqCst);
    });
}

/// Write `key value` lines, largest key first, matching the group order
/// the shuffle produced.
fn write_output(path: &str, results: Vec<(Bytes, Bytes)>) -> Result<()> {
    let mut file = fs::File::create(path)?;
    for (key, value) in results.into_iter().sorted_by(|a, b| b.0.cmp(&a.0)) {
        writeln!(
            file,
            "{} {}",
            String::from_utf8_lossy(&key),
            String::from_utf8_lossy(&value)
        )?;
    }
    Ok(())
}
