//! Sample MapReduce applications for the local engine.
//!
//! Every workload here implements [`mrt_engine::MapReduce`] over
//! [`Bytes`] keys and values, and can be resolved from its command-line
//! name through [`try_named`].

use bytes::Bytes;
use mrt_engine::{MapContext, MapReduce, ReduceContext};

pub mod grep;
pub mod util;
pub mod vertex_degree;
pub mod wc;

/// One input record: the source file path and its contents.
pub type InputRecord = (Bytes, Bytes);

/// A workload resolved from its command-line name.
pub enum NamedWorkload {
    WordCount(wc::WordCount),
    Grep(grep::Grep),
    VertexDegree(vertex_degree::VertexDegree),
}

/// Resolve a workload by name. `aux` carries the application's trailing
/// command-line arguments (the grep pattern, for instance).
pub fn try_named(name: &str, aux: &[String]) -> Option<NamedWorkload> {
    match name {
        "wc" => Some(NamedWorkload::WordCount(wc::WordCount)),
        "grep" => Some(NamedWorkload::Grep(grep::Grep::new(aux.join(" ")))),
        "vertex-degree" => Some(NamedWorkload::VertexDegree(vertex_degree::VertexDegree)),
        _ => None,
    }
}

/// The names `try_named` accepts.
pub fn names() -> &'static [&'static str] {
    &["wc", "grep", "vertex-degree"]
}

impl MapReduce for NamedWorkload {
    type InputKey = Bytes;
    type InputValue = Bytes;
    type IntermediateKey = Bytes;
    type IntermediateValue = Bytes;
    type OutputKey = Bytes;
    type OutputValue = Bytes;

    fn map(&self, key: &Bytes, value: &Bytes, ctx: &mut MapContext<Bytes, Bytes>) {
        match self {
            NamedWorkload::WordCount(inner) => inner.map(key, value, ctx),
            NamedWorkload::Grep(inner) => inner.map(key, value, ctx),
            NamedWorkload::VertexDegree(inner) => inner.map(key, value, ctx),
        }
    }

    fn reduce(&self, group: &[(Bytes, Bytes)], ctx: &mut ReduceContext<'_, Bytes, Bytes>) {
        match self {
            NamedWorkload::WordCount(inner) => inner.reduce(group, ctx),
            NamedWorkload::Grep(inner) => inner.reduce(group, ctx),
            NamedWorkload::VertexDegree(inner) => inner.reduce(group, ctx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_workload_names() {
        for name in names() {
            assert!(try_named(name, &[]).is_some(), "{name} did not resolve");
        }
        assert!(try_named("sort", &[]).is_none());
    }
}
