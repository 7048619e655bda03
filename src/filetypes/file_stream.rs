use std::io::{self, SeekFrom};

use log::{debug, warn};

use super::{helpers::timestamp_now, BlockCursor, FileStream};
use crate::filesystem::Partition;
use crate::structs::Inode;
use crate::Error;

impl<'a> FileStream<'a> {
    /// Open file at its beginning
    pub fn open(partition: &'a mut Partition, index: u32) -> Result<Self, Error> {
        let inode = partition.load_inode(index)?;
        let cursor = BlockCursor::new(partition.block_size());
        Ok(Self {
            partition,
            inode,
            cursor,
        })
    }

    /// Open file positioned at its end, for appending
    pub fn open_at_end(partition: &'a mut Partition, index: u32) -> Result<Self, Error> {
        let mut file = Self::open(partition, index)?;
        file.seek(file.inode.size)?;
        Ok(file)
    }

    pub fn inode(&self) -> &Inode {
        &self.inode
    }

    pub fn size(&self) -> u32 {
        self.inode.size
    }

    pub fn position(&self) -> u32 {
        self.cursor.position()
    }

    /// Move to `position`, clamped to the file's size
    pub fn seek(&mut self, position: u32) -> Result<u32, Error> {
        let position = position.min(self.inode.size);
        self.cursor.set(position);
        // Nothing to resolve in an empty file, or at an end falling on a block boundary
        let at_boundary = position % self.partition.block_size() == 0;
        if self.inode.size == 0 || (position == self.inode.size && at_boundary) {
            return Ok(position);
        }
        self.resolve_existing()?;
        Ok(position)
    }

    /// Read contents of the file into a buffer, starting at the current position.
    /// Returns the number of bytes read, zero at end of file.
    pub fn read(&mut self, buffer: &mut [u8]) -> Result<usize, Error> {
        let mut total = 0;
        while total < buffer.len() && self.cursor.position() < self.inode.size {
            let length = self.next_chunk(buffer.len() - total)?;
            let start = self.cursor.byte();
            let block = self.partition.block(self.cursor.block());
            buffer[total..total + length].copy_from_slice(&block[start..start + length]);
            self.cursor.advance(length as u32);
            total += length;
        }
        Ok(total)
    }

    /// Read up to and including the next newline, leaving room for a terminating
    /// zero byte. Returns the number of bytes before the terminator, zero at end of file.
    pub fn read_line(&mut self, buffer: &mut [u8]) -> Result<usize, Error> {
        if buffer.is_empty() {
            return Ok(0);
        }
        let capacity = buffer.len() - 1;
        let mut total = 0;
        while total < capacity && self.cursor.position() < self.inode.size {
            let length = self.next_chunk(capacity - total)?;
            let start = self.cursor.byte();
            let chunk = &self.partition.block(self.cursor.block())[start..start + length];
            let length = chunk
                .iter()
                .position(|&b| b == b'\n')
                .map_or(length, |newline| newline + 1);
            buffer[total..total + length].copy_from_slice(&chunk[..length]);
            self.cursor.advance(length as u32);
            total += length;
            if buffer[total - 1] == b'\n' {
                break;
            }
        }
        buffer[total] = 0;
        Ok(total)
    }

    /// Write a buffer at the current position, growing the file as needed.
    /// Stops early when the partition runs out of blocks or the file reaches its
    /// maximum size, returning the number of bytes actually written.
    pub fn write(&mut self, buffer: &[u8]) -> Result<usize, Error> {
        let mut total = 0;
        while total < buffer.len() {
            if self.cursor.position() == u32::MAX {
                warn!("Inode {} reached maximum size", self.inode.index);
                break;
            }
            if !self.cursor.is_resolved() {
                let logical = self.cursor.logical_block();
                let block = if self.cursor.position() >= self.inode.size {
                    match self.partition.resolve_for_write(&mut self.inode, logical) {
                        Ok(block) => block,
                        Err(e) if e.is_exhausted() || matches!(e, Error::FileTooLarge) => {
                            warn!(
                                "Short write to inode {}: {total} of {} bytes ({e})",
                                self.inode.index,
                                buffer.len()
                            );
                            break;
                        }
                        Err(e) => return Err(e),
                    }
                } else {
                    self.existing_block(logical)?
                };
                self.cursor.resolve(block);
            }
            let length = (buffer.len() - total)
                .min(self.cursor.remaining() as usize)
                .min((u32::MAX - self.cursor.position()) as usize);
            let start = self.cursor.byte();
            let block = self.partition.block_mut(self.cursor.block());
            block[start..start + length].copy_from_slice(&buffer[total..total + length]);
            self.cursor.advance(length as u32);
            total += length;
            if self.cursor.position() > self.inode.size {
                self.inode.size = self.cursor.position();
            }
        }
        if total > 0 {
            self.inode.mtime = timestamp_now();
            self.partition.flush_inode(&self.inode);
        }
        Ok(total)
    }

    /// Release the cursor
    pub fn close(self) {
        debug!(
            "Closed inode {} at position {}",
            self.inode.index,
            self.cursor.position()
        );
    }

    /// Make sure the cursor sits on a resolved block inside the file, and return
    /// how many of the `wanted` bytes can be served from it
    fn next_chunk(&mut self, wanted: usize) -> Result<usize, Error> {
        if !self.cursor.is_resolved() {
            self.resolve_existing()?;
        }
        let left_in_file = (self.inode.size - self.cursor.position()) as usize;
        Ok(wanted
            .min(self.cursor.remaining() as usize)
            .min(left_in_file))
    }

    fn resolve_existing(&mut self) -> Result<(), Error> {
        let block = self.existing_block(self.cursor.logical_block())?;
        self.cursor.resolve(block);
        Ok(())
    }

    /// Block inside the file's size, which has to be allocated already
    fn existing_block(&self, logical: u64) -> Result<u32, Error> {
        self.partition
            .resolve_for_read(&self.inode, logical)?
            .ok_or(Error::BrokenChain(self.inode.index))
    }
}

impl Partition {
    /// Open file at its beginning
    pub fn open(&mut self, index: u32) -> Result<FileStream<'_>, Error> {
        FileStream::open(self, index)
    }

    /// Open file positioned at its end
    pub fn open_at_end(&mut self, index: u32) -> Result<FileStream<'_>, Error> {
        FileStream::open_at_end(self, index)
    }
}

impl io::Read for FileStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(FileStream::read(self, buf)?)
    }
}

impl io::Write for FileStream<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(FileStream::write(self, buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Seek for FileStream<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(bytes) => bytes as i128,
            SeekFrom::End(bytes) => self.inode.size as i128 + bytes as i128,
            SeekFrom::Current(bytes) => self.cursor.position() as i128 + bytes as i128,
        };
        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of file",
            ));
        }
        let target = target.min(u32::MAX as i128) as u32;
        Ok(FileStream::seek(self, target)? as u64)
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Seek, SeekFrom, Write};

    use crate::filesystem::Partition;
    use crate::structs::Geometry;
    use crate::Error;

    fn small_partition(blocks: u32) -> Partition {
        let geometry = Geometry::new(128, 128).unwrap();
        Partition::with_geometry(blocks * 128, geometry).unwrap()
    }

    #[test]
    fn write_and_read() {
        let mut partition = small_partition(1024);
        let index = partition.touch().unwrap();
        let buff = (1..=1000).map(|v| v as u8).collect::<Vec<u8>>();
        let mut file = partition.open(index).unwrap();
        assert_eq!(file.write(&buff).unwrap(), buff.len());
        assert_eq!(file.size(), buff.len() as u32);
        let mut buff1 = vec![0u8; 200];
        assert_eq!(file.seek(100).unwrap(), 100);
        assert_eq!(file.read(&mut buff1).unwrap(), 200);
        assert_eq!(&buff[100..300], &buff1[..]);
        assert_eq!(file.position(), 300);
    }

    #[test]
    fn read_stops_at_end() {
        let mut partition = small_partition(1024);
        let index = partition.touch().unwrap();
        partition.open(index).unwrap().write(b"hello").unwrap();
        let mut file = partition.open(index).unwrap();
        let mut buffer = [0u8; 16];
        assert_eq!(file.read(&mut buffer).unwrap(), 5);
        assert_eq!(&buffer[..5], b"hello");
        assert_eq!(file.read(&mut buffer).unwrap(), 0);
    }

    #[test]
    fn empty_file() {
        let mut partition = small_partition(1024);
        let index = partition.touch().unwrap();
        let mut file = partition.open(index).unwrap();
        assert_eq!(file.seek(10).unwrap(), 0);
        let mut buffer = [0u8; 4];
        assert_eq!(file.read(&mut buffer).unwrap(), 0);
        assert_eq!(file.read_line(&mut buffer).unwrap(), 0);
        assert_eq!(buffer[0], 0);
    }

    #[test]
    fn seek_clamps_to_size() {
        let mut partition = small_partition(1024);
        let index = partition.touch().unwrap();
        let mut file = partition.open(index).unwrap();
        file.write(&[1u8; 300]).unwrap();
        assert_eq!(file.seek(1000).unwrap(), 300);
        assert_eq!(file.seek(128).unwrap(), 128);
        let mut buffer = [0u8; 1];
        assert_eq!(file.read(&mut buffer).unwrap(), 1);
        assert_eq!(file.position(), 129);
    }

    #[test]
    fn overwrite_inside_file() {
        let mut partition = small_partition(1024);
        let index = partition.touch().unwrap();
        let used = {
            let mut file = partition.open(index).unwrap();
            file.write(&[b'a'; 400]).unwrap();
            file.seek(120).unwrap();
            assert_eq!(file.write(&[b'b'; 20]).unwrap(), 20);
            assert_eq!(file.size(), 400);
            file.close();
            partition.header().block_used
        };
        let mut file = partition.open(index).unwrap();
        let mut buffer = vec![0u8; 400];
        file.read(&mut buffer).unwrap();
        assert!(buffer[..120].iter().all(|&b| b == b'a'));
        assert!(buffer[120..140].iter().all(|&b| b == b'b'));
        assert!(buffer[140..].iter().all(|&b| b == b'a'));
        drop(file);
        assert_eq!(partition.header().block_used, used);
    }

    #[test]
    fn write_straddling_end() {
        let mut partition = small_partition(1024);
        let index = partition.touch().unwrap();
        let mut file = partition.open(index).unwrap();
        file.write(&[b'a'; 400]).unwrap();
        drop(file);
        let used = partition.header().block_used;
        let mut file = partition.open(index).unwrap();
        assert_eq!(file.seek(350).unwrap(), 350);
        assert_eq!(file.write(&[b'b'; 200]).unwrap(), 200);
        assert_eq!(file.size(), 550);
        assert_eq!(file.position(), 550);
        drop(file);
        // Blocks 0..4 already covered 400 bytes, 550 needs a fifth
        assert_eq!(partition.header().block_used, used + 1);
        let mut buffer = vec![0u8; 600];
        assert_eq!(partition.open(index).unwrap().read(&mut buffer).unwrap(), 550);
        assert!(buffer[..350].iter().all(|&b| b == b'a'));
        assert!(buffer[350..550].iter().all(|&b| b == b'b'));
    }

    #[test]
    fn corrupt_pointer_is_reported() {
        let mut partition = small_partition(1024);
        let index = partition.touch().unwrap();
        partition.open(index).unwrap().write(&[1u8; 300]).unwrap();
        let mut inode = partition.load_inode(index).unwrap();
        inode.direct[1] = 1_000_000;
        partition.flush_inode(&inode);
        let mut file = partition.open(index).unwrap();
        let mut buffer = [0u8; 300];
        assert!(matches!(file.read(&mut buffer), Err(Error::BrokenChain(i)) if i == index));
    }

    #[test]
    fn append_at_block_boundary() {
        let mut partition = small_partition(1024);
        let index = partition.touch().unwrap();
        partition.open(index).unwrap().write(&[1u8; 256]).unwrap();
        let mut file = partition.open_at_end(index).unwrap();
        assert_eq!(file.position(), 256);
        file.write(&[2u8; 10]).unwrap();
        assert_eq!(file.size(), 266);
        drop(file);
        // Header block stays untouched
        let header = *partition.header();
        assert_eq!(crate::structs::Header::decode(partition.as_bytes()).unwrap(), header);
        let mut buffer = vec![0u8; 266];
        partition.open(index).unwrap().read(&mut buffer).unwrap();
        assert!(buffer[..256].iter().all(|&b| b == 1));
        assert!(buffer[256..].iter().all(|&b| b == 2));
    }

    #[test]
    fn read_line_splits_records() {
        let mut partition = small_partition(1024);
        let index = partition.touch().unwrap();
        let mut text = Vec::new();
        for line in 0..40 {
            text.extend_from_slice(format!("line number {line}\n").as_bytes());
        }
        text.extend_from_slice(b"tail");
        partition.open(index).unwrap().write(&text).unwrap();
        let mut file = partition.open(index).unwrap();
        let mut buffer = [0u8; 64];
        for line in 0..40 {
            let expected = format!("line number {line}\n");
            let length = file.read_line(&mut buffer).unwrap();
            assert_eq!(length, expected.len());
            assert_eq!(&buffer[..length], expected.as_bytes());
            assert_eq!(buffer[length], 0);
        }
        assert_eq!(file.read_line(&mut buffer).unwrap(), 4);
        assert_eq!(&buffer[..5], b"tail\0");
        assert_eq!(file.read_line(&mut buffer).unwrap(), 0);
    }

    #[test]
    fn read_line_respects_buffer() {
        let mut partition = small_partition(1024);
        let index = partition.touch().unwrap();
        partition.open(index).unwrap().write(b"abcdefgh\n").unwrap();
        let mut file = partition.open(index).unwrap();
        let mut buffer = [0u8; 5];
        assert_eq!(file.read_line(&mut buffer).unwrap(), 4);
        assert_eq!(&buffer, b"abcd\0");
        assert_eq!(file.read_line(&mut buffer).unwrap(), 4);
        assert_eq!(&buffer, b"efgh\0");
        assert_eq!(file.read_line(&mut buffer).unwrap(), 1);
        assert_eq!(&buffer[..2], b"\n\0");
    }

    #[test]
    fn short_write_when_full() {
        let mut partition = small_partition(64);
        let index = partition.touch().unwrap();
        let free = partition.header().block_count - partition.header().block_used;
        let data = vec![9u8; 64 * 128];
        let mut file = partition.open(index).unwrap();
        let written = file.write(&data).unwrap();
        // Direct blocks, then one index block with the rest of its data blocks
        assert_eq!(written, (free as usize - 1) * 128);
        assert_eq!(file.size() as usize, written);
        assert_eq!(file.write(&data).unwrap(), 0);
        drop(file);
        assert_eq!(partition.header().block_used, partition.header().block_count);
        partition.erase(index).unwrap();
        assert_eq!(
            partition.header().block_count - partition.header().block_used,
            free
        );
    }

    #[test]
    fn io_traits() {
        let mut partition = small_partition(1024);
        let index = partition.touch().unwrap();
        let mut file = partition.open(index).unwrap();
        file.write_all(b"0123456789").unwrap();
        assert_eq!(Seek::seek(&mut file, SeekFrom::End(-4)).unwrap(), 6);
        let mut tail = String::new();
        file.read_to_string(&mut tail).unwrap();
        assert_eq!(tail, "6789");
        assert_eq!(Seek::seek(&mut file, SeekFrom::Current(-8)).unwrap(), 2);
        assert_eq!(Seek::seek(&mut file, SeekFrom::Start(50)).unwrap(), 10);
        assert!(Seek::seek(&mut file, SeekFrom::Current(-11)).is_err());
    }

    #[test]
    fn unallocated_inode() {
        let mut partition = small_partition(1024);
        assert!(matches!(partition.open(5), Err(Error::OutOfBounds)));
    }
}
