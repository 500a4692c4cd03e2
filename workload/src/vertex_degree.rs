//! A MapReduce-compatible application that computes the
//! degree of each vertex in a graph, given a list of edges.

use anyhow::{anyhow, Result};
use bytes::Bytes;
use tracing::warn;

use mrt_engine::{MapContext, MapReduce, ReduceContext};

use crate::util::string_from_bytes;

fn parse_line(line: &str) -> Result<(u64, u64)> {
    let mut iter = line.split_whitespace().take(2);
    let a = iter
        .next()
        .ok_or_else(|| anyhow!("Invalid input file format"))?
        .parse()?;
    let b = iter
        .next()
        .ok_or_else(|| anyhow!("Invalid input file format"))?
        .parse()?;
    Ok((a, b))
}

/// Counts, for every vertex, the edges incident to it.
pub struct VertexDegree;

impl MapReduce for VertexDegree {
    type InputKey = Bytes;
    type InputValue = Bytes;
    type IntermediateKey = Bytes;
    type IntermediateValue = Bytes;
    type OutputKey = Bytes;
    type OutputValue = Bytes;

    fn map(&self, _key: &Bytes, value: &Bytes, ctx: &mut MapContext<Bytes, Bytes>) {
        let contents = match string_from_bytes(value.clone()) {
            Ok(contents) => contents,
            Err(err) => {
                warn!("skipping undecodable input record: {err}");
                return;
            }
        };
        for line in contents.lines() {
            match parse_line(line) {
                Ok((a, b)) => {
                    ctx.emit(Bytes::from(a.to_string()), Bytes::from_static(b"1"));
                    ctx.emit(Bytes::from(b.to_string()), Bytes::from_static(b"1"));
                }
                Err(err) => warn!("skipping malformed edge `{line}`: {err}"),
            }
        }
    }

    fn reduce(&self, group: &[(Bytes, Bytes)], ctx: &mut ReduceContext<'_, Bytes, Bytes>) {
        let mut count = 0u64;
        for (_, value) in group {
            match string_from_bytes(value.clone()).and_then(|s| Ok(s.parse::<u64>()?)) {
                Ok(n) => count += n,
                Err(err) => warn!("skipping malformed degree value: {err}"),
            }
        }
        if let Some((key, _)) = group.first() {
            ctx.emit(key.clone(), Bytes::from(count.to_string()));
        }
    }
}
