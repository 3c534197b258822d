use std::{fmt, io};

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the public API.
///
/// Tolerated conditions (unknown magic tags, unknown clip idents, a
/// `num_images` mismatch) are never turned into an [`Error`]; they are
/// logged and skipped, per the container/clip reader's "tolerate unknown"
/// rule.
#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    Format(FormatError),
}

/// Structural decode failures.
#[derive(Debug)]
pub enum FormatError {
    /// Node header bytes `10..16` matched neither accepted signature.
    InvalidSignature,
    /// A chunk/node declared more bytes than remained in its container.
    TruncatedChunk { needed: usize, available: usize },
    /// Reserved for exhaustive matching; tree-building never returns this —
    /// unknown tags are skipped and logged instead.
    UnknownMagic([u8; 4]),
    /// An RLE expansion did not produce exactly `w*h*4` bytes.
    RleDecode { expected: usize, actual: usize },
    /// zlib inflate failed, or a block's declared size didn't match.
    Inflate(String),
    /// The `first_info` image-redirection chain didn't terminate within
    /// `|layer.images|` steps.
    ImageRedirectCycle,
    /// A `second_info`, `lookup_index`, or computed index fell outside its
    /// array.
    OutOfRange { index: u32, len: usize },
    /// CPY resolution needed a previous image but `first_info` was neither
    /// `2`, `6`, nor `64`.
    UnknownFirstInfo(u32),
    /// A well-known top-level entry (e.g. project metadata) was missing.
    MissingEntry(&'static str),
    /// An `LRSR` chunk appeared without a preceding `LNAM`+`LRSH` pair.
    OrphanLrsr,
    /// A UTF-16BE dictionary entry contained an unpaired surrogate.
    InvalidUtf16,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "{err}"),
            Error::Format(err) => write!(f, "{err}"),
        }
    }
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use FormatError as E;

        match self {
            E::InvalidSignature => write!(f, "node header signature is not recognized"),
            E::TruncatedChunk { needed, available } => write!(
                f,
                "chunk declared {needed} bytes but only {available} remained"
            ),
            E::UnknownMagic(tag) => write!(f, "unknown magic tag {tag:02x?}"),
            E::RleDecode { expected, actual } => {
                write!(f, "RLE expansion produced {actual} bytes, expected {expected}")
            }
            E::Inflate(msg) => write!(f, "zlib inflate failed: {msg}"),
            E::ImageRedirectCycle => write!(f, "image redirection chain did not terminate"),
            E::OutOfRange { index, len } => {
                write!(f, "index {index} is out of range for array of length {len}")
            }
            E::UnknownFirstInfo(info) => write!(f, "unknown first_info value: {info}"),
            E::MissingEntry(name) => write!(f, "'{name}' entry is missing"),
            E::OrphanLrsr => write!(f, "LRSR chunk without a preceding LNAM/LRSH pair"),
            E::InvalidUtf16 => write!(f, "dictionary entry is not valid UTF-16"),
        }
    }
}

impl std::error::Error for Error {}
impl std::error::Error for FormatError {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<FormatError> for Error {
    fn from(err: FormatError) -> Self {
        Error::Format(err)
    }
}
