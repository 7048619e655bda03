use log::{debug, info, warn};

use super::directory_entry::is_valid_name;
use super::{DirectoryEntry, EntryKind};
use crate::filesystem::Partition;
use crate::Error;

/// Longest record a directory holds, terminating zero byte included
pub const LINE_BUFFER_SIZE: usize = 512;

impl Partition {
    /// Entries of a directory, most recently linked first.
    /// Records that cannot be parsed are skipped.
    pub fn list(&mut self, directory: u32) -> Result<Vec<DirectoryEntry>, Error> {
        let mut file = self.open(directory)?;
        let mut buffer = [0u8; LINE_BUFFER_SIZE];
        let mut entries = Vec::new();
        loop {
            let length = file.read_line(&mut buffer)?;
            if length == 0 {
                break;
            }
            let parsed = std::str::from_utf8(&buffer[..length])
                .ok()
                .and_then(DirectoryEntry::parse);
            match parsed {
                Some(entry) => entries.push(entry),
                None => debug!("Skipping malformed record in directory {directory}"),
            }
        }
        file.close();
        entries.reverse();
        Ok(entries)
    }

    /// Find entry by name
    pub fn lookup(&mut self, directory: u32, name: &str) -> Result<Option<DirectoryEntry>, Error> {
        Ok(self
            .list(directory)?
            .into_iter()
            .find(|entry| entry.name == name))
    }

    /// Add a named entry for `target` to a directory and count the new reference
    pub fn link(
        &mut self,
        directory: u32,
        target: u32,
        kind: EntryKind,
        name: &str,
    ) -> Result<(), Error> {
        let record = DirectoryEntry::new(target, kind, name).encode();
        if !is_valid_name(name) || record.len() >= LINE_BUFFER_SIZE {
            return Err(Error::InvalidName);
        }
        if self.lookup(directory, name)?.is_some() {
            return Err(Error::AlreadyExists);
        }
        let mut target_inode = self.load_inode(target)?;

        let mut file = self.open_at_end(directory)?;
        let previous_size = file.size();
        let written = file.write(record.as_bytes())?;
        file.close();
        if written < record.len() {
            warn!("Directory {directory} is full, dropping partial record for {name}");
            self.truncate(directory, previous_size)?;
            return Err(Error::OutOfBlocks);
        }

        // Directory may be linking to itself, so reload after the write
        if target == directory {
            target_inode = self.load_inode(target)?;
        }
        target_inode.reference_count += 1;
        self.flush_inode(&target_inode);
        debug!("Linked inode {target} as {name} in directory {directory}");
        Ok(())
    }

    /// Remove a named entry from a directory, deleting its inode once nothing
    /// references it anymore. Returns whether the name was present.
    pub fn unlink(&mut self, directory: u32, name: &str) -> Result<bool, Error> {
        let entries = self.list(directory)?;
        let Some(removed) = entries.iter().find(|entry| entry.name == name).cloned() else {
            return Ok(false);
        };
        let mut inode = self.load_inode(removed.inode)?;

        // Rewrite the remaining records in their original order
        self.erase(directory)?;
        let mut file = self.open(directory)?;
        for entry in entries.iter().rev().filter(|entry| entry.name != name) {
            let record = entry.encode();
            if file.write(record.as_bytes())? < record.len() {
                return Err(Error::OutOfBlocks);
            }
        }
        file.close();

        // Directory may have held an entry for itself
        if removed.inode == directory {
            inode = self.load_inode(directory)?;
        }
        inode.reference_count = inode.reference_count.saturating_sub(1);
        self.flush_inode(&inode);
        debug!("Unlinked {name} from directory {directory}");
        if inode.reference_count == 0 {
            self.delete(removed.inode)?;
        }
        Ok(true)
    }

    /// Allocate a new inode and link it into a directory
    pub fn create_entry(&mut self, directory: u32, kind: EntryKind, name: &str) -> Result<u32, Error> {
        let index = self.touch()?;
        if let Err(e) = self.link(directory, index, kind, name) {
            self.delete(index)?;
            return Err(e);
        }
        info!("Created {name} as inode {index} in directory {directory}");
        Ok(index)
    }
}
