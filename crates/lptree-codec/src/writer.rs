use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use lptree_value::Value;

use crate::encode::encode_into;
use crate::error::{StreamError, StreamResult};
use crate::guard::GuardConfig;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete values to any `Write` stream.
pub struct ValueWriter<T> {
    inner: T,
    buf: BytesMut,
    config: GuardConfig,
}

impl<T: Write> ValueWriter<T> {
    /// Create a new value writer with default limits.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, GuardConfig::default())
    }

    /// Create a new value writer with explicit limits.
    pub fn with_config(inner: T, config: GuardConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Encode and write a complete value (blocking), then flush.
    ///
    /// Nothing is written if the value cannot be encoded.
    pub fn write_value(&mut self, value: &Value) -> StreamResult<()> {
        self.buf.clear();
        encode_into(value, &self.config, &mut self.buf)?;

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(StreamError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(StreamError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> StreamResult<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(StreamError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current writer limits.
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::error::EncodeError;
    use crate::reader::ValueReader;

    #[test]
    fn write_single_value() {
        let mut writer = ValueWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.write_value(&Value::integer("age", 25)).unwrap();

        let wire = writer.into_inner().into_inner();
        assert_eq!(wire, b"int.3:2age25");
    }

    #[test]
    fn write_then_read_back() {
        let values = vec![
            Value::string("greeting", "hello"),
            Value::array("list", vec![Value::float("pi", 3.25), Value::null("nothing")]),
            Value::null(""),
        ];

        let mut writer = ValueWriter::new(Cursor::new(Vec::<u8>::new()));
        for value in &values {
            writer.write_value(value).unwrap();
        }

        let wire = writer.into_inner().into_inner();
        let read: Vec<_> = ValueReader::new(Cursor::new(wire))
            .map(Result::unwrap)
            .collect();
        assert_eq!(read, values);
    }

    #[test]
    fn unencodable_value_writes_nothing() {
        let mut writer = ValueWriter::new(Cursor::new(Vec::<u8>::new()));
        let err = writer
            .write_value(&Value::float("f", f64::NAN))
            .unwrap_err();
        assert!(matches!(
            err,
            StreamError::Encode(EncodeError::NonFiniteFloat { .. })
        ));
        assert!(writer.get_ref().get_ref().is_empty());
    }

    #[test]
    fn writer_limits_apply() {
        let cfg = GuardConfig {
            max_name_length: 2,
            ..GuardConfig::default()
        };
        let mut writer = ValueWriter::with_config(Cursor::new(Vec::<u8>::new()), cfg);
        let err = writer.write_value(&Value::null("long")).unwrap_err();
        assert!(matches!(
            err,
            StreamError::Encode(EncodeError::NameTooLong { len: 4, max: 2 })
        ));
        assert_eq!(writer.config().max_name_length, 2);
    }

    #[test]
    fn every_value_is_flushed() {
        let mut writer = ValueWriter::new(CountingSink::default());
        writer.write_value(&Value::boolean("ok", true)).unwrap();
        writer.write_value(&Value::null("n")).unwrap();

        let sink = writer.get_ref();
        assert_eq!(sink.flushes, 2);
        assert_eq!(sink.data, b"bln.2:4oktruenul.1:0n");
    }

    #[test]
    fn zero_length_write_is_closed() {
        let mut writer = ValueWriter::new(ClosedPipe);
        let err = writer.write_value(&Value::null("n")).unwrap_err();
        assert!(matches!(err, StreamError::ConnectionClosed));
        let _ = writer.get_mut();
    }

    /// Accepts at most three bytes per write.
    #[derive(Default)]
    struct CountingSink {
        data: Vec<u8>,
        flushes: usize,
    }

    impl Write for CountingSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let n = buf.len().min(3);
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushes += 1;
            Ok(())
        }
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
