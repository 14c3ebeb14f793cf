//! `tokio_util::codec` adapter for framed async streams.

use bytes::BytesMut;
use lptree_value::Value;
use tokio_util::codec::{Decoder, Encoder};

use crate::decode::{decode, decode_buffered};
use crate::encode::encode_into;
use crate::error::StreamError;
use crate::guard::GuardConfig;

/// Decodes and encodes back-to-back values on a byte stream.
#[derive(Debug, Clone, Default)]
pub struct ValueCodec {
    config: GuardConfig,
}

impl ValueCodec {
    /// Create a codec with explicit limits.
    pub fn new(config: GuardConfig) -> Self {
        Self { config }
    }

    /// Current codec limits.
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }
}

impl Decoder for ValueCodec {
    type Item = Value;
    type Error = StreamError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Value>, StreamError> {
        Ok(decode_buffered(src, &self.config)?)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Value>, StreamError> {
        if let Some(value) = decode_buffered(src, &self.config)? {
            return Ok(Some(value));
        }
        if src.is_empty() {
            return Ok(None);
        }
        let value = decode(src, &self.config)?;
        src.clear();
        Ok(Some(value))
    }
}

impl Encoder<&Value> for ValueCodec {
    type Error = StreamError;

    fn encode(&mut self, item: &Value, dst: &mut BytesMut) -> Result<(), StreamError> {
        encode_into(item, &self.config, dst)?;
        Ok(())
    }
}

impl Encoder<Value> for ValueCodec {
    type Error = StreamError;

    fn encode(&mut self, item: Value, dst: &mut BytesMut) -> Result<(), StreamError> {
        encode_into(&item, &self.config, dst)?;
        Ok(())
    }
}
