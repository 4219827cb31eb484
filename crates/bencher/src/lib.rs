use flate2::Compression;
use flate2::write::{GzEncoder, ZlibEncoder};
use micro_response::Encoding;
use std::io::Write;

#[derive(Debug, Copy, Clone)]
pub struct TestCase {
    name: &'static str,
    encoding: Encoding,
    file: TestFile,
}

impl TestCase {
    pub fn new(name: &'static str, encoding: Encoding, file: TestFile) -> Self {
        Self { name, encoding, file }
    }

    pub fn gzip(name: &'static str, file: TestFile) -> Self {
        Self::new(name, Encoding::Gzip, file)
    }

    pub fn deflate(name: &'static str, file: TestFile) -> Self {
        Self::new(name, Encoding::Deflate, file)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn file(&self) -> &TestFile {
        &self.file
    }

    /// The file content compressed with the case's encoding, as it would arrive on the wire.
    pub fn encoded_body(&self) -> Vec<u8> {
        let content = self.file.content().as_bytes();
        match self.encoding {
            Encoding::Identity => content.to_vec(),
            Encoding::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(content).expect("in memory gzip encoding should not fail");
                encoder.finish().expect("in memory gzip encoding should not fail")
            }
            Encoding::Deflate => {
                let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(content).expect("in memory zlib encoding should not fail");
                encoder.finish().expect("in memory zlib encoding should not fail")
            }
        }
    }
}

#[derive(Debug, Copy, Clone)]
pub struct TestFile {
    file_name: &'static str,
    content: &'static str,
}

impl TestFile {
    pub const fn new(file_name: &'static str, content: &'static str) -> Self {
        Self { file_name, content }
    }

    pub fn content(&self) -> &'static str {
        self.content
    }

    pub fn file_name(&self) -> &'static str {
        self.file_name
    }
}
