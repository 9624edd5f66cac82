use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use memmap::{Mmap, MmapOptions};

use errors::Result;

/// The raw bytes of an effect group file, however they were read.
///
/// Groups are decoded straight out of `bytes()`, and the decoded script names borrow from it, so
/// keep this alive until `from_bare` has copied out what it needs.  Files are mapped; stdin and
/// empty files are held in a `Vec`.
pub enum InputBuffer {
    Owned(Vec<u8>),
    Mapped(Mmap),
}

impl InputBuffer {
    /// Slurp a whole group piped in on stdin, as in `fxgroup - info`
    pub fn new_from_stdin() -> Result<InputBuffer> {
        let mut buf = Vec::new();
        io::stdin().read_to_end(&mut buf)?;

        Ok(InputBuffer::Owned(buf))
    }

    /// Map an effect group file read-only.  A zero-length file can't be mapped, so it comes back as
    /// an empty buffer, and decoding it then reports truncation rather than an I/O error.
    pub fn new_from_file<P>(path: P) -> Result<InputBuffer>
    where
        P: AsRef<Path>,
    {
        let file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            return Ok(InputBuffer::Owned(Vec::new()));
        }
        let mmap = unsafe { MmapOptions::new().map(&file)? };

        Ok(InputBuffer::Mapped(mmap))
    }

    /// Open the file named on the command line; `-` reads stdin instead.
    pub fn open(name: &str) -> Result<InputBuffer> {
        match name {
            "-" => InputBuffer::new_from_stdin(),
            path => InputBuffer::new_from_file(path),
        }
    }

    /// The whole file, ready for `parse_effect_group`
    pub fn bytes(&self) -> &[u8] {
        match *self {
            InputBuffer::Owned(ref v) => &*v,
            InputBuffer::Mapped(ref m) => &*m,
        }
    }
}
