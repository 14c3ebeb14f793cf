use std::io::{ErrorKind, Read};
use std::iter::FusedIterator;

use bytes::BytesMut;
use lptree_value::Value;
use tracing::debug;

use crate::decode::{decode, decode_buffered};
use crate::error::{StreamError, StreamResult};
use crate::guard::GuardConfig;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete values from any `Read` stream.
///
/// Values are read back to back. Partial reads are buffered internally and a
/// value is decoded only once its whole declared span has arrived.
pub struct ValueReader<T> {
    inner: T,
    buf: BytesMut,
    config: GuardConfig,
    /// Set once iteration has ended, by clean close or by an error.
    finished: bool,
}

impl<T: Read> ValueReader<T> {
    /// Create a new value reader with default limits.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, GuardConfig::default())
    }

    /// Create a new value reader with explicit limits.
    pub fn with_config(inner: T, config: GuardConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
            finished: false,
        }
    }

    /// Read the next complete value (blocking).
    ///
    /// Returns `Err(StreamError::ConnectionClosed)` when EOF is reached with
    /// nothing buffered. Bytes still buffered at EOF are decoded as final
    /// input, so a value ending in its CONTENTLEN digits is accepted there.
    pub fn read_value(&mut self) -> StreamResult<Value> {
        loop {
            if let Some(value) = decode_buffered(&mut self.buf, &self.config)? {
                return Ok(value);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(StreamError::Io(err)),
            };

            if read == 0 {
                return self.finish();
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    fn finish(&mut self) -> StreamResult<Value> {
        if self.buf.is_empty() {
            return Err(StreamError::ConnectionClosed);
        }
        debug!(buffered = self.buf.len(), "decoding remainder at end of stream");
        let value = decode(&self.buf, &self.config)?;
        self.buf.clear();
        Ok(value)
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Bytes received but not yet decoded.
    pub fn buffered(&self) -> &[u8] {
        &self.buf
    }

    /// Current reader limits.
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }
}

impl<T: Read> Iterator for ValueReader<T> {
    type Item = StreamResult<Value>;

    /// Yields values until the stream closes. The first error is yielded
    /// once and ends the iteration; the bytes that caused it stay buffered.
    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_value() {
            Ok(value) => Some(Ok(value)),
            Err(StreamError::ConnectionClosed) => {
                self.finished = true;
                None
            }
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}

impl<T: Read> FusedIterator for ValueReader<T> {}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::encode::encode;
    use crate::error::ParseErrorKind;

    fn wire(values: &[Value]) -> Vec<u8> {
        let mut out = Vec::new();
        for value in values {
            out.extend_from_slice(&encode(value, &GuardConfig::default()).unwrap());
        }
        out
    }

    #[test]
    fn read_single_value() {
        let bytes = wire(&[Value::string("name", "this starts")]);
        let mut reader = ValueReader::new(Cursor::new(bytes));
        let value = reader.read_value().unwrap();
        assert_eq!(value, Value::string("name", "this starts"));
    }

    #[test]
    fn read_multiple_values() {
        let values = vec![
            Value::integer("a", 1),
            Value::object("o", vec![Value::boolean("b", false)]),
            Value::binary("raw", vec![b's', b't', b'r', b'.']),
        ];
        let reader = ValueReader::new(Cursor::new(wire(&values)));
        let read: Vec<_> = reader.map(Result::unwrap).collect();
        assert_eq!(read, values);
    }

    #[test]
    fn value_ending_in_digits_at_eof() {
        let mut reader = ValueReader::new(Cursor::new(b"nul.0:0".to_vec()));
        assert_eq!(reader.read_value().unwrap(), Value::null(""));
        assert!(matches!(
            reader.read_value().unwrap_err(),
            StreamError::ConnectionClosed
        ));
    }

    #[test]
    fn partial_read_handling() {
        let bytes = wire(&[Value::array(
            "items",
            vec![Value::string("hello", "hello"), Value::integer("num", 42)],
        )]);
        let mut reader = ValueReader::new(ByteByByteReader { bytes, pos: 0 });
        let value = reader.read_value().unwrap();
        assert_eq!(value.at(1).and_then(Value::as_i64), Some(42));
    }

    #[test]
    fn connection_closed_cleanly() {
        let mut reader = ValueReader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.read_value().unwrap_err();
        assert!(matches!(err, StreamError::ConnectionClosed));
    }

    #[test]
    fn connection_closed_mid_value() {
        let mut reader = ValueReader::new(Cursor::new(b"str.4:11namethis".to_vec()));
        let err = reader.read_value().unwrap_err();
        assert!(matches!(
            err,
            StreamError::Parse(e) if e.kind() == ParseErrorKind::LengthOverflow
        ));
    }

    #[test]
    fn garbage_in_stream() {
        let mut reader = ValueReader::new(Cursor::new(b"xyz.1:1a1".to_vec()));
        let err = reader.read_value().unwrap_err();
        assert!(matches!(
            err,
            StreamError::Parse(e) if e.kind() == ParseErrorKind::UnknownType
        ));
    }

    #[test]
    fn oversized_value_in_stream() {
        let cfg = GuardConfig {
            max_content_length: 16,
            ..GuardConfig::default()
        };
        let mut reader = ValueReader::with_config(Cursor::new(b"bin.1:1024b".to_vec()), cfg);
        let err = reader.read_value().unwrap_err();
        assert!(matches!(
            err,
            StreamError::Parse(e) if e.kind() == ParseErrorKind::LengthOverflow
        ));
    }

    #[test]
    fn iteration_ends_after_first_error() {
        let reader = ValueReader::new(Cursor::new(b"xyz.1:1a1int.1:1n1".to_vec()));
        let results: Vec<_> = reader.take(5).collect();
        assert_eq!(results.len(), 1);
        assert!(matches!(
            &results[0],
            Err(StreamError::Parse(e)) if e.kind() == ParseErrorKind::UnknownType
        ));

        let mut reader = ValueReader::new(Cursor::new(b"int.1:1n1xyz".to_vec()));
        assert_eq!(reader.next().unwrap().unwrap(), Value::integer("n", 1));
        assert!(reader.next().unwrap().is_err());
        assert!(reader.next().is_none());
        assert!(reader.next().is_none());
        assert_eq!(reader.buffered(), b"xyz");
    }

    #[test]
    fn interrupted_read_retries() {
        let bytes = wire(&[Value::integer("n", 8)]);
        let reader = InterruptedThenData {
            interrupted: false,
            inner: Cursor::new(bytes),
        };
        let mut values = ValueReader::new(reader);
        assert_eq!(values.read_value().unwrap(), Value::integer("n", 8));
    }

    #[test]
    fn would_block_propagates_io_error() {
        struct WouldBlock;
        impl Read for WouldBlock {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::from(ErrorKind::WouldBlock))
            }
        }

        let mut reader = ValueReader::new(WouldBlock);
        let err = reader.read_value().unwrap_err();
        assert!(matches!(err, StreamError::Io(e) if e.kind() == ErrorKind::WouldBlock));
    }

    #[test]
    fn accessors_and_into_inner() {
        let mut reader = ValueReader::new(Cursor::new(b"int.1:1n".to_vec()));
        assert!(reader.read_value().is_err());
        assert!(reader.buffered().starts_with(b"int"));
        assert_eq!(reader.config(), &GuardConfig::default());
        let _ = reader.get_ref();
        let _ = reader.get_mut();
        let _inner = reader.into_inner();
    }

    #[derive(Debug)]
    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct InterruptedThenData {
        interrupted: bool,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.inner.read(buf)
        }
    }
}
