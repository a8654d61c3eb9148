use std::fs::File;
use std::io::{self, BufReader, ErrorKind, Read};
use std::path::Path;

use anyhow::Result;

/// Raw sample input from a file or from stdin (`-`).
pub struct InputReader {
    reader: Box<dyn Read>,
    is_pipe: bool,
    len: Option<u64>,
}

impl InputReader {
    pub fn new<P: AsRef<Path>>(input_path: P) -> Result<Self> {
        let is_pipe = input_path.as_ref().to_string_lossy() == "-";

        let (reader, len): (Box<dyn Read>, _) = if is_pipe {
            (Box::new(io::stdin().lock()), None)
        } else {
            let file = File::open(input_path)?;
            let len = file.metadata().ok().map(|m| m.len());
            (Box::new(BufReader::new(file)), len)
        };

        Ok(Self {
            reader,
            is_pipe,
            len,
        })
    }

    #[cfg(test)]
    pub fn from_reader(reader: impl Read + 'static) -> Self {
        Self {
            reader: Box::new(reader),
            is_pipe: true,
            len: None,
        }
    }

    /// Fill `buffer` as far as the input allows.
    ///
    /// Short reads are retried, so anything less than `buffer.len()` means
    /// EOF. This keeps every chunk but the last aligned to the sample size.
    pub fn read_chunk(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buffer.len() {
            match self.reader.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }

    pub fn is_pipe(&self) -> bool {
        self.is_pipe
    }

    /// Input size in bytes, when reading a regular file.
    pub fn total_bytes(&self) -> Option<u64> {
        self.len
    }

    /// Process data in chunks of `chunk_size` bytes using a callback function.
    /// The callback returns Ok(true) to continue or Ok(false) to stop.
    pub fn process_chunks<F>(&mut self, chunk_size: usize, mut callback: F) -> Result<()>
    where
        F: FnMut(&[u8]) -> Result<bool>,
    {
        let mut buffer = vec![0u8; chunk_size];

        loop {
            let bytes_read = self.read_chunk(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }

            if !callback(&buffer[..bytes_read])? || bytes_read < chunk_size {
                break;
            }
        }

        Ok(())
    }
}
