use std::fmt::Display;

#[derive(Debug)]
pub enum Error {
    TooSmall,
    InvalidGeometry,
    OutOfInodes,
    OutOfBlocks,
    FileTooLarge,
    OutOfBounds,
    BrokenChain(u32),
    InvalidName,
    AlreadyExists,
    StillLinked,
    Io(std::io::Error),
}

impl Error {
    /// Capacity exhaustion, as opposed to misuse or corruption
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::OutOfInodes | Self::OutOfBlocks)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooSmall => write!(f, "partition too small"),
            Self::InvalidGeometry => write!(f, "invalid partition geometry"),
            Self::OutOfInodes => write!(f, "no free inodes"),
            Self::OutOfBlocks => write!(f, "no free blocks"),
            Self::FileTooLarge => write!(f, "file too large"),
            Self::OutOfBounds => write!(f, "out of bounds"),
            Self::BrokenChain(inode) => write!(f, "broken block chain in inode {inode}"),
            Self::InvalidName => write!(f, "invalid file name"),
            Self::AlreadyExists => write!(f, "file already exists"),
            Self::StillLinked => write!(f, "inode is still linked"),
            Self::Io(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<Error> for std::io::Error {
    fn from(value: Error) -> Self {
        match value {
            Error::Io(e) => e,
            e @ (Error::OutOfBlocks | Error::OutOfInodes | Error::FileTooLarge) => {
                std::io::Error::new(std::io::ErrorKind::OutOfMemory, e)
            }
            e @ (Error::OutOfBounds | Error::InvalidName) => {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, e)
            }
            e => std::io::Error::new(std::io::ErrorKind::Other, e),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}
