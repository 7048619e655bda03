use super::{DirectoryEntry, EntryKind};

pub(crate) const FIELD_DELIMITER: char = '|';
pub(crate) const RECORD_DELIMITER: char = '\n';

const REGULAR_FILE_TAG: u32 = 1;
const DIRECTORY_TAG: u32 = 2;

impl From<u32> for EntryKind {
    fn from(tag: u32) -> Self {
        match tag {
            REGULAR_FILE_TAG => Self::RegularFile,
            DIRECTORY_TAG => Self::Directory,
            other => Self::Other(other),
        }
    }
}

impl From<EntryKind> for u32 {
    fn from(kind: EntryKind) -> Self {
        match kind {
            EntryKind::RegularFile => REGULAR_FILE_TAG,
            EntryKind::Directory => DIRECTORY_TAG,
            EntryKind::Other(tag) => tag,
        }
    }
}

impl DirectoryEntry {
    pub fn new(inode: u32, kind: EntryKind, name: &str) -> Self {
        Self {
            inode,
            kind,
            name: name.to_owned(),
        }
    }

    /// Parse one `<inode>|<kind>|<name>` record, numbers in hex.
    /// A trailing newline is allowed; anything malformed yields `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.strip_suffix(RECORD_DELIMITER).unwrap_or(line);
        let mut fields = line.splitn(3, FIELD_DELIMITER);
        let inode = parse_hex(fields.next()?)?;
        let kind = parse_hex(fields.next()?)?;
        let name = fields.next()?;
        if !is_valid_name(name) {
            return None;
        }
        Some(Self::new(inode, kind.into(), name))
    }

    /// Record line, newline included
    pub fn encode(&self) -> String {
        format!(
            "{:x}{FIELD_DELIMITER}{:x}{FIELD_DELIMITER}{}{RECORD_DELIMITER}",
            self.inode,
            u32::from(self.kind),
            self.name
        )
    }
}

fn parse_hex(field: &str) -> Option<u32> {
    if field.is_empty() {
        return None;
    }
    u32::from_str_radix(field, 16).ok()
}

/// Names have to be non-empty and must not contain either delimiter
pub(crate) fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains([FIELD_DELIMITER, RECORD_DELIMITER])
}
