//! Inode filesystem living inside a single in-memory partition blob.
//!
//! A [`Partition`] owns the whole blob: header, inode and block bitmaps,
//! inode table and data blocks. Files are read and written through a
//! [`FileStream`], and directories are plain files holding one
//! [`DirectoryEntry`] record per line.

mod error;
mod filesystem;
mod filetypes;
pub mod structs;

pub use error::Error;
pub use filesystem::{Partition, TierAddress};
pub use filetypes::{BlockCursor, DirectoryEntry, EntryKind, FileStream, LINE_BUFFER_SIZE};

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};

    use crate::structs::Geometry;
    use crate::{EntryKind, Error, Partition};

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn assert_counters(partition: &Partition) {
        let header = partition.header();
        assert_eq!(partition.inode_bitmap().count_used(), header.inode_used);
        assert_eq!(partition.block_bitmap().count_used(), header.block_used);
    }

    #[test]
    fn file_spanning_indirect_blocks() {
        init();
        let geometry = Geometry::new(128, 128).unwrap();
        let mut partition = Partition::with_geometry(512 * 1024, geometry).unwrap();
        let root = partition.root();
        let index = partition.create_entry(root, EntryKind::RegularFile, "big").unwrap();
        let data = (0..3000u32).map(|v| (v % 251) as u8).collect::<Vec<u8>>();
        let used = partition.header().block_used;

        let mut file = partition.open(index).unwrap();
        file.write_all(&data).unwrap();
        file.close();
        // 24 data blocks and the single indirect index block
        assert_eq!(partition.header().block_used, used + 25);

        let mut read = Vec::new();
        partition.open(index).unwrap().read_to_end(&mut read).unwrap();
        assert_eq!(read, data);
        assert_counters(&partition);
    }

    #[test]
    fn exhausted_partition_keeps_written_data() {
        init();
        let mut partition = Partition::create(32 * 1024).unwrap();
        let root = partition.root();
        let first = partition.create_entry(root, EntryKind::RegularFile, "first").unwrap();
        let second = partition.create_entry(root, EntryKind::RegularFile, "second").unwrap();

        partition.open(first).unwrap().write(&[1u8; 4096]).unwrap();
        let huge = vec![2u8; 64 * 1024];
        let written = partition.open(second).unwrap().write(&huge).unwrap();
        assert!(written < huge.len());
        assert_eq!(partition.header().block_used, partition.header().block_count);
        assert_eq!(partition.load_inode(second).unwrap().size as usize, written);

        let mut buffer = vec![0u8; 4096];
        assert_eq!(partition.open(first).unwrap().read(&mut buffer).unwrap(), 4096);
        assert!(buffer.iter().all(|&b| b == 1));
        assert_eq!(partition.open_at_end(first).unwrap().write(&[3u8; 10]).unwrap(), 0);
        assert_eq!(partition.load_inode(first).unwrap().size, 4096);
        assert_counters(&partition);

        partition.unlink(root, "second").unwrap();
        partition.create_entry(root, EntryKind::RegularFile, "third").unwrap();
        assert_counters(&partition);
    }

    #[test]
    fn directory_tree_survives_reload() {
        init();
        let mut partition = Partition::create(256 * 1024).unwrap();
        let root = partition.root();
        let docs = partition.create_entry(root, EntryKind::Directory, "docs").unwrap();
        let note = partition.create_entry(docs, EntryKind::RegularFile, "note.txt").unwrap();
        partition.open(note).unwrap().write(b"remember the milk").unwrap();
        partition.link(root, note, EntryKind::RegularFile, "note").unwrap();

        let mut loaded = Partition::load(&partition.serialize()).unwrap();
        assert_eq!(loaded.header(), partition.header());
        let entry = loaded.lookup(root, "docs").unwrap().unwrap();
        assert_eq!(entry.kind, EntryKind::Directory);
        let entry = loaded.lookup(entry.inode, "note.txt").unwrap().unwrap();
        assert_eq!(entry.inode, note);
        let mut text = String::new();
        loaded.open(note).unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "remember the milk");
    }

    #[test]
    fn hard_links_share_inode() {
        init();
        let mut partition = Partition::create(256 * 1024).unwrap();
        let root = partition.root();
        let inodes = partition.header().inode_used;
        let blocks = partition.header().block_used;
        let index = partition.create_entry(root, EntryKind::RegularFile, "a").unwrap();
        partition.link(root, index, EntryKind::RegularFile, "b").unwrap();
        partition.open(index).unwrap().write(&[7u8; 3000]).unwrap();
        assert_eq!(partition.load_inode(index).unwrap().reference_count, 2);
        assert!(matches!(partition.delete(index), Err(Error::StillLinked)));

        partition.unlink(root, "a").unwrap();
        assert_eq!(partition.load_inode(index).unwrap().reference_count, 1);
        assert_eq!(partition.load_inode(index).unwrap().size, 3000);
        partition.unlink(root, "b").unwrap();
        assert!(partition.load_inode(index).is_err());
        assert_eq!(partition.header().inode_used, inodes);
        assert_eq!(partition.header().block_used, blocks);
        assert_counters(&partition);
    }
}
