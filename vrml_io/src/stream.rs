use std::io::{self, BufReader, Cursor, Read};
use std::sync::Arc;

/// A readable resource together with where it came from and what it claims to be.
pub trait ResourceStream: Read + Send {
    fn url(&self) -> &str;
    fn media_type(&self) -> &str;
    /// `false` once the stream is known to be exhausted.
    fn data_available(&self) -> bool;
}

impl<S: ResourceStream + ?Sized> ResourceStream for Box<S> {
    fn url(&self) -> &str {
        (**self).url()
    }

    fn media_type(&self) -> &str {
        (**self).media_type()
    }

    fn data_available(&self) -> bool {
        (**self).data_available()
    }
}

/// Receives the contents of a stream as it is read.
pub trait StreamListener: Send {
    /// Called once, before any data.
    fn stream_available(&mut self, url: &str, media_type: &str);
    /// Called for each chunk read, in order.
    fn data_available(&mut self, data: &[u8]);
}

pub struct MemoryStream {
    url: String,
    media_type: String,
    cursor: Cursor<Arc<[u8]>>,
}

impl MemoryStream {
    pub fn new(url: impl Into<String>, media_type: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            url: url.into(),
            media_type: media_type.into(),
            cursor: Cursor::new(data.into()),
        }
    }
}

impl Read for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl ResourceStream for MemoryStream {
    fn url(&self) -> &str {
        &self.url
    }

    fn media_type(&self) -> &str {
        &self.media_type
    }

    fn data_available(&self) -> bool {
        (self.cursor.position() as usize) < self.cursor.get_ref().len()
    }
}

/// Stream over any reader, e.g. a file or a decompressor wrapping one.
pub struct ReaderStream {
    url: String,
    media_type: String,
    reader: BufReader<Box<dyn Read + Send>>,
    exhausted: bool,
}

impl ReaderStream {
    pub fn new(url: impl Into<String>, media_type: impl Into<String>, reader: Box<dyn Read + Send>) -> Self {
        Self {
            url: url.into(),
            media_type: media_type.into(),
            reader: BufReader::new(reader),
            exhausted: false,
        }
    }
}

impl Read for ReaderStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.reader.read(buf)?;
        if n == 0 && !buf.is_empty() {
            self.exhausted = true;
        }
        Ok(n)
    }
}

impl ResourceStream for ReaderStream {
    fn url(&self) -> &str {
        &self.url
    }

    fn media_type(&self) -> &str {
        &self.media_type
    }

    fn data_available(&self) -> bool {
        !self.exhausted
    }
}
