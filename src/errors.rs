use std::io;

use nom::{self, IResult};

error_chain! {
    foreign_links {
        Io(io::Error);
    }

    errors {
        ParseError {
            description("nonspecific parse error")
            display("nonspecific parse error")
        }
        TruncatedData(whence: &'static str) {
            description("unexpected end of input")
            display("unexpected end of input while parsing {}", whence)
        }
        UnsupportedVersion(version: u32) {
            description("unsupported format version")
            display("unsupported effect group format version {} (expected {})", version, ::parse::effect_group::FORMAT_VERSION)
        }
        UnknownStageKind(slot: usize, kind: u32) {
            description("unknown stage kind")
            display("stage {} has unknown kind {}", slot, kind)
        }
        ScriptTooLong(slot: usize, len: usize) {
            description("script name too long")
            display("script name for stage {} is {} bytes, but at most 65535 fit", slot, len)
        }
        OpenFailed(path: String) {
            description("couldn't open file")
            display("couldn't open {}", path)
        }
    }
}

/// Convert a nom result into one of ours, keeping the unparsed remainder.  Running out of input is
/// the only failure the binary parsers can really have, so that gets its own error kind; anything
/// else is lumped together.
pub fn nom_to_result<'a, T>(whence: &'static str, buf: &'a [u8], result: IResult<&'a [u8], T>) -> Result<(&'a [u8], T)> {
    match result {
        Ok((leftovers, value)) => Ok((leftovers, value)),
        Err(nom::Err::Incomplete(needed)) => {
            debug!("{}: needed {:?} more, buffer is {} bytes", whence, needed, buf.len());
            Err(ErrorKind::TruncatedData(whence).into())
        }
        Err(nom::Err::Error(_)) | Err(nom::Err::Failure(_)) => {
            Err(ErrorKind::ParseError.into())
        }
    }
}
