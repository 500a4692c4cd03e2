//! Word count: one `(word, "1")` pair per word, reduced to per-word
//! totals.

use bytes::Bytes;
use tracing::warn;

use mrt_engine::{MapContext, MapReduce, ReduceContext};

use crate::util::string_from_bytes;

/// The classic word-count workload.
pub struct WordCount;

impl MapReduce for WordCount {
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
        for word in contents.split_whitespace() {
            ctx.emit(
                Bytes::copy_from_slice(word.as_bytes()),
                Bytes::from_static(b"1"),
            );
        }
    }

    fn reduce(&self, group: &[(Bytes, Bytes)], ctx: &mut ReduceContext<'_, Bytes, Bytes>) {
        if let Some((key, _)) = group.first() {
            ctx.emit(key.clone(), Bytes::from(group.len().to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mrt_engine::Job;

    #[test]
    fn counts_words_across_files() {
        let input = vec![
            (
                Bytes::from_static(b"a.txt"),
                Bytes::from_static(b"the quick brown fox the"),
            ),
            (
                Bytes::from_static(b"b.txt"),
                Bytes::from_static(b"the lazy dog"),
            ),
        ];
        let job = Job::start(WordCount, input, 2);
        let output = job.into_output();
        assert_eq!(output.len(), 6);
        let the = output
            .iter()
            .find(|(key, _)| key.as_ref() == b"the")
            .unwrap();
        assert_eq!(the.1.as_ref(), b"3");
    }
}
