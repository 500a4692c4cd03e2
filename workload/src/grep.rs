//! Pattern match: emits matching lines keyed by their source file,
//! reduced to one newline-joined block per file.

use bytes::{BufMut, Bytes, BytesMut};
use tracing::warn;

use mrt_engine::{MapContext, MapReduce, ReduceContext};

use crate::util::string_from_bytes;

/// Collects every input line containing a fixed pattern.
pub struct Grep {
    pattern: String,
}

impl Grep {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }
}

impl MapReduce for Grep {
    type InputKey = Bytes;
    type InputValue = Bytes;
    type IntermediateKey = Bytes;
    type IntermediateValue = Bytes;
    type OutputKey = Bytes;
    type OutputValue = Bytes;

    fn map(&self, key: &Bytes, value: &Bytes, ctx: &mut MapContext<Bytes, Bytes>) {
        let contents = match string_from_bytes(value.clone()) {
            Ok(contents) => contents,
            Err(err) => {
                warn!("skipping undecodable input record: {err}");
                return;
            }
        };
        for line in contents.lines() {
            if line.contains(&self.pattern) {
                ctx.emit(key.clone(), Bytes::copy_from_slice(line.as_bytes()));
            }
        }
    }

    fn reduce(&self, group: &[(Bytes, Bytes)], ctx: &mut ReduceContext<'_, Bytes, Bytes>) {
        let Some((key, _)) = group.first() else {
            return;
        };
        let mut buffer = BytesMut::new();
        for (_, line) in group {
            buffer.put_slice(line);
            buffer.put_slice(b"\n");
        }
        ctx.emit(key.clone(), buffer.freeze());
    }
}
