/*
 * Copyright 2025 Luc Lenôtre
 *
 * This file is part of sfs.
 *
 * sfs is free software: you can redistribute it and/or modify it under the
 * terms of the GNU General Public License as published by the Free Software
 * Foundation, either version 3 of the License, or (at your option) any later
 * version.
 *
 * sfs is distributed in the hope that it will be useful, but WITHOUT ANY
 * WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR
 * A PARTICULAR PURPOSE. See the GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License along with
 * sfs. If not, see <https://www.gnu.org/licenses/>.
 */

//! Filesystem control (`format`, `mount`, `debug`) and the inode engine
//! (`create`, `remove`, `stat`, `read`, `write`) built on top of it.

use crate::bitmap::Bitmap;
use crate::block::BlockDevice;
use crate::inode_table::{load_inode, save_inode};
use crate::layout::{
    read_indirect_block, write_indirect_block, InodeRecord, Superblock, BLOCK_SIZE,
    MAX_FILE_SIZE, POINTERS_PER_BLOCK, POINTERS_PER_INODE,
};
use std::cell::RefCell;

/// Initializes a fresh image on `disk`: a superblock sized to the device, and every other
/// block zeroed.
///
/// Fails if the device is already mounted, or has no blocks at all.
pub fn format<D: BlockDevice>(disk: &D) -> bool {
    if disk.mounted() {
        return false;
    }
    let block_count = disk.block_count();
    if block_count == 0 {
        return false;
    }
    let superblock = Superblock::new(block_count);
    disk.write_block(0, &superblock.to_block())
        .expect("sfs: disk I/O error while formatting");
    let zero = [0u8; BLOCK_SIZE];
    for block in 1..block_count {
        disk.write_block(block, &zero)
            .expect("sfs: disk I/O error while formatting");
    }
    true
}

/// Prints a read-only inspection of `disk` to stdout: the superblock fields, then every valid
/// inode's inumber, size, direct pointers, and (if present) indirect block and data pointers.
///
/// Does not require (or perform) a mount.
pub fn debug<D: BlockDevice>(disk: &D) {
    if disk.block_count() == 0 {
        println!("SuperBlock: device has no blocks");
        return;
    }
    let mut buf = [0u8; BLOCK_SIZE];
    disk.read_block(0, &mut buf)
        .expect("sfs: disk I/O error while reading superblock");
    let superblock = Superblock::from_block(&buf);
    let magic_valid = superblock.magic_number == crate::layout::MAGIC_NUMBER;

    println!("SuperBlock:");
    println!(
        "    magic number is {}",
        if magic_valid { "valid" } else { "invalid" }
    );
    println!("    {} blocks", superblock.blocks);
    println!("    {} inode blocks", superblock.inode_blocks);
    println!("    {} inodes", superblock.inodes);

    if !superblock.is_valid(disk.block_count()) {
        return;
    }

    for inumber in 0..superblock.inodes {
        let record = load_inode(disk, superblock.inodes, inumber)
            .expect("sfs: disk I/O error while reading inode table")
            .expect("inumber is within range by construction");
        if !record.is_valid() {
            continue;
        }
        println!("Inode {inumber}:");
        println!("    size: {} bytes", record.size);
        let direct: Vec<u32> = record.direct.iter().copied().filter(|&p| p != 0).collect();
        if !direct.is_empty() {
            println!("    direct blocks: {direct:?}");
        }
        if record.indirect != 0 {
            println!("    indirect block: {}", record.indirect);
            let mut indirect_buf = [0u8; BLOCK_SIZE];
            disk.read_block(record.indirect, &mut indirect_buf)
                .expect("sfs: disk I/O error while reading indirect block");
            let pointers: Vec<u32> = read_indirect_block(&indirect_buf)
                .into_iter()
                .filter(|&p| p != 0)
                .collect();
            if !pointers.is_empty() {
                println!("    indirect data blocks: {pointers:?}");
            }
        }
    }
}

/// A mounted filesystem: the owning handle returned by [`FileSystem::mount`] and consumed by
/// every subsequent operation. Its destructor unmounts the underlying device.
pub struct FileSystem<D: BlockDevice> {
    disk: D,
    blocks: u32,
    inode_blocks: u32,
    inodes: u32,
    bitmap: RefCell<Bitmap>,
}

impl<D: BlockDevice> FileSystem<D> {
    /// Validates `disk`'s superblock and, if valid, mounts it: increments the device's mount
    /// counter and reconstructs the free-block bitmap by walking the on-disk inode graph.
    ///
    /// Returns `None` if the device is already mounted, has no blocks, or its superblock fails
    /// validation (bad magic, bad block count, bad inode block count); in every case the
    /// device is simply dropped, unmutated.
    pub fn mount(disk: D) -> Option<Self> {
        if disk.mounted() || disk.block_count() == 0 {
            return None;
        }
        let mut buf = [0u8; BLOCK_SIZE];
        disk.read_block(0, &mut buf)
            .expect("sfs: disk I/O error while reading superblock");
        let superblock = Superblock::from_block(&buf);
        if !superblock.is_valid(disk.block_count()) {
            return None;
        }
        disk.mount();
        let bitmap = Bitmap::reconstruct(&disk, superblock.inode_blocks, superblock.inodes)
            .expect("sfs: disk I/O error while reconstructing bitmap");
        Some(Self {
            disk,
            blocks: superblock.blocks,
            inode_blocks: superblock.inode_blocks,
            inodes: superblock.inodes,
            bitmap: RefCell::new(bitmap),
        })
    }

    /// Releases the mount. Equivalent to dropping the handle; spelled out for readability at
    /// call sites.
    pub fn unmount(self) {}

    /// Total number of blocks on the mounted device.
    pub fn block_count(&self) -> u32 {
        self.blocks
    }

    /// Number of blocks reserved for the inode table.
    pub fn inode_block_count(&self) -> u32 {
        self.inode_blocks
    }

    /// Total number of inode slots.
    pub fn inode_count(&self) -> u32 {
        self.inodes
    }

    fn load_valid_inode(&self, inumber: u32) -> Option<InodeRecord> {
        let record = load_inode(&self.disk, self.inodes, inumber)
            .expect("sfs: disk I/O error while reading inode table")?;
        record.is_valid().then_some(record)
    }

    /// Scans the inode table in ascending order for the first unused slot, marks it valid and
    /// empty, and returns its inumber. Returns `None` once every inode slot is in use.
    pub fn create(&self) -> Option<u32> {
        for inumber in 0..self.inodes {
            let record = load_inode(&self.disk, self.inodes, inumber)
                .expect("sfs: disk I/O error while reading inode table")
                .expect("inumber is within range by construction");
            if !record.is_valid() {
                let fresh = InodeRecord {
                    valid: 1,
                    ..Default::default()
                };
                save_inode(&self.disk, self.inodes, inumber, fresh)
                    .expect("sfs: disk I/O error while writing inode table");
                return Some(inumber);
            }
        }
        None
    }

    /// Releases every block owned by `inumber` and marks it unused. Returns `false` if the
    /// inumber is out of range or already unused.
    pub fn remove(&self, inumber: u32) -> bool {
        let Some(record) = self.load_valid_inode(inumber) else {
            return false;
        };
        let mut bitmap = self.bitmap.borrow_mut();
        for &ptr in &record.direct {
            if ptr != 0 {
                bitmap.release(ptr);
            }
        }
        if record.indirect != 0 {
            // The indirect block's contents must be read before it (or anything it points to)
            // is released: releasing first risks a concurrent allocation reusing the block
            // before its pointers have been followed.
            let mut indirect_buf = [0u8; BLOCK_SIZE];
            self.disk
                .read_block(record.indirect, &mut indirect_buf)
                .expect("sfs: disk I/O error while reading indirect block");
            for ptr in read_indirect_block(&indirect_buf) {
                if ptr != 0 {
                    bitmap.release(ptr);
                }
            }
            bitmap.release(record.indirect);
        }
        drop(bitmap);
        save_inode(&self.disk, self.inodes, inumber, InodeRecord::default())
            .expect("sfs: disk I/O error while writing inode table");
        true
    }

    /// Returns the logical size of `inumber`, or `None` if it is out of range or unused.
    pub fn stat(&self, inumber: u32) -> Option<u32> {
        self.load_valid_inode(inumber).map(|record| record.size)
    }

    /// Reads up to `buf.len()` bytes starting at `offset` into `buf`, returning the number of
    /// bytes actually read (clamped to the file's size). `None` if the inumber is invalid or
    /// `offset` is past the end of the file (an `offset` exactly at the end is valid and
    /// returns `Some(0)`).
    pub fn read(&self, inumber: u32, buf: &mut [u8], offset: u32) -> Option<usize> {
        let record = self.load_valid_inode(inumber)?;
        if offset > record.size {
            return None;
        }
        let length = buf.len().min((record.size - offset) as usize);
        if length == 0 {
            return Some(0);
        }

        let start_block = (offset / BLOCK_SIZE as u32) as usize;
        let end_block = ((offset + length as u32 - 1) / BLOCK_SIZE as u32) as usize;

        let indirect_pointers = if end_block >= POINTERS_PER_INODE {
            let mut indirect_buf = [0u8; BLOCK_SIZE];
            if record.indirect != 0 {
                self.disk
                    .read_block(record.indirect, &mut indirect_buf)
                    .expect("sfs: disk I/O error while reading indirect block");
            }
            Some(read_indirect_block(&indirect_buf))
        } else {
            None
        };

        let mut written = 0usize;
        let mut remaining = length;
        let mut block_offset = (offset % BLOCK_SIZE as u32) as usize;
        for i in start_block..=end_block {
            let ptr = if i < POINTERS_PER_INODE {
                record.direct[i]
            } else {
                indirect_pointers.expect("computed above")[i - POINTERS_PER_INODE]
            };
            let take = (BLOCK_SIZE - block_offset).min(remaining);
            assert_ne!(
                ptr, 0,
                "sfs: corrupted image: in-range block pointer is unallocated"
            );
            let mut data = [0u8; BLOCK_SIZE];
            self.disk
                .read_block(ptr, &mut data)
                .expect("sfs: disk I/O error while reading data block");
            buf[written..written + take].copy_from_slice(&data[block_offset..block_offset + take]);
            written += take;
            remaining -= take;
            block_offset = 0;
        }
        Some(written)
    }

    /// Writes up to `buf.len()` bytes from `buf` starting at `offset`, extending the file as
    /// needed (but never past `offset`, sparse holes are rejected) and never past
    /// [`MAX_FILE_SIZE`](crate::layout::MAX_FILE_SIZE). Returns the number of bytes actually
    /// written; this is less than `buf.len()` only when the device ran out of free blocks
    /// (a short write), never an error on its own. `None` if the inumber is invalid or
    /// `offset` is past the current size.
    pub fn write(&self, inumber: u32, buf: &[u8], offset: u32) -> Option<usize> {
        let mut record = self.load_valid_inode(inumber)?;
        if offset > record.size {
            return None;
        }
        let max_len = MAX_FILE_SIZE.saturating_sub(offset as u64) as usize;
        let length = buf.len().min(max_len);
        if length == 0 {
            return Some(0);
        }

        let start_block = (offset / BLOCK_SIZE as u32) as usize;
        let end_block = ((offset + length as u32 - 1) / BLOCK_SIZE as u32) as usize;

        let mut bitmap = self.bitmap.borrow_mut();
        let mut indirect_pointers: Option<[u32; POINTERS_PER_BLOCK]> = None;
        let mut indirect_dirty = false;

        let mut written = 0usize;
        let mut remaining = length;
        let mut block_offset = (offset % BLOCK_SIZE as u32) as usize;

        for i in start_block..=end_block {
            let take = (BLOCK_SIZE - block_offset).min(remaining);

            let ptr = if i < POINTERS_PER_INODE {
                if record.direct[i] == 0 {
                    match bitmap.allocate(&self.disk).expect("sfs: disk I/O error while allocating") {
                        Some(b) => {
                            record.direct[i] = b;
                            b
                        }
                        None => break,
                    }
                } else {
                    record.direct[i]
                }
            } else {
                if indirect_pointers.is_none() {
                    if record.indirect == 0 {
                        match bitmap
                            .allocate(&self.disk)
                            .expect("sfs: disk I/O error while allocating")
                        {
                            Some(b) => {
                                record.indirect = b;
                                indirect_pointers = Some([0u32; POINTERS_PER_BLOCK]);
                                indirect_dirty = true;
                            }
                            None => break,
                        }
                    } else {
                        let mut indirect_buf = [0u8; BLOCK_SIZE];
                        self.disk
                            .read_block(record.indirect, &mut indirect_buf)
                            .expect("sfs: disk I/O error while reading indirect block");
                        indirect_pointers = Some(read_indirect_block(&indirect_buf));
                    }
                }
                let idx = i - POINTERS_PER_INODE;
                let pointers = indirect_pointers.as_mut().expect("populated above");
                if pointers[idx] == 0 {
                    match bitmap.allocate(&self.disk).expect("sfs: disk I/O error while allocating") {
                        Some(b) => {
                            pointers[idx] = b;
                            indirect_dirty = true;
                            b
                        }
                        None => break,
                    }
                } else {
                    pointers[idx]
                }
            };

            if take == BLOCK_SIZE {
                let mut data = [0u8; BLOCK_SIZE];
                data.copy_from_slice(&buf[written..written + take]);
                self.disk
                    .write_block(ptr, &data)
                    .expect("sfs: disk I/O error while writing data block");
            } else {
                let mut data = [0u8; BLOCK_SIZE];
                self.disk
                    .read_block(ptr, &mut data)
                    .expect("sfs: disk I/O error while reading data block");
                data[block_offset..block_offset + take]
                    .copy_from_slice(&buf[written..written + take]);
                self.disk
                    .write_block(ptr, &data)
                    .expect("sfs: disk I/O error while writing data block");
            }

            written += take;
            remaining -= take;
            block_offset = 0;
        }
        drop(bitmap);

        record.size = record.size.max(offset + written as u32);
        save_inode(&self.disk, self.inodes, inumber, record)
            .expect("sfs: disk I/O error while writing inode table");
        if indirect_dirty {
            let pointers = indirect_pointers.expect("set whenever indirect_dirty is true");
            self.disk
                .write_block(record.indirect, &write_indirect_block(&pointers))
                .expect("sfs: disk I/O error while writing indirect block");
        }

        Some(written)
    }
}

impl<D: BlockDevice> Drop for FileSystem<D> {
    fn drop(&mut self) {
        self.disk.unmount();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::MemDisk;

    fn formatted_disk(blocks: u32) -> MemDisk {
        let disk = MemDisk::new(blocks);
        assert!(format(&disk));
        disk
    }

    #[test]
    fn format_rejects_empty_device() {
        let disk = MemDisk::new(0);
        assert!(!format(&disk));
    }

    #[test]
    fn format_then_mount_reports_expected_layout() {
        let disk = formatted_disk(20);
        let fs = FileSystem::mount(disk).unwrap();
        assert_eq!(fs.block_count(), 20);
        assert_eq!(fs.inode_block_count(), 2);
        assert_eq!(fs.inode_count(), 256);
    }

    #[test]
    fn mount_rejects_unformatted_device() {
        let disk = MemDisk::new(20);
        assert!(FileSystem::mount(disk).is_none());
    }

    #[test]
    fn mount_twice_fails_on_second_attempt() {
        let disk = formatted_disk(20);
        // `FileSystem::mount` takes the device by value, so emulate "the same underlying
        // device is already mounted" the way two independent handles to one real disk file
        // would: mount once, then ask the device directly.
        assert!(!disk.mounted());
        disk.mount();
        assert!(FileSystem::mount(disk).is_none());
    }

    #[test]
    fn create_then_stat_then_write_then_read_roundtrip() {
        let disk = formatted_disk(20);
        let fs = FileSystem::mount(disk).unwrap();

        let a = fs.create().unwrap();
        assert_eq!(a, 0);
        assert_eq!(fs.stat(a), Some(0));
        let b = fs.create().unwrap();
        assert_eq!(b, 1);

        let written = fs.write(a, b"hello", 0).unwrap();
        assert_eq!(written, 5);
        assert_eq!(fs.stat(a), Some(5));

        let mut buf = [0u8; 5];
        let read = fs.read(a, &mut buf, 0).unwrap();
        assert_eq!(read, 5);
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn read_at_exact_end_of_file_returns_zero() {
        let disk = formatted_disk(20);
        let fs = FileSystem::mount(disk).unwrap();
        let a = fs.create().unwrap();
        fs.write(a, b"hi", 0).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(fs.read(a, &mut buf, 2), Some(0));
    }

    #[test]
    fn read_past_end_of_file_fails() {
        let disk = formatted_disk(20);
        let fs = FileSystem::mount(disk).unwrap();
        let a = fs.create().unwrap();
        fs.write(a, b"hi", 0).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(fs.read(a, &mut buf, 3), None);
    }

    #[test]
    fn write_past_end_of_file_is_rejected() {
        let disk = formatted_disk(20);
        let fs = FileSystem::mount(disk).unwrap();
        let a = fs.create().unwrap();
        fs.write(a, b"hi", 0).unwrap();
        assert_eq!(fs.write(a, b"gap", 5), None);
    }

    #[test]
    fn write_spanning_direct_and_indirect_allocates_indirect_block() {
        let disk = formatted_disk(20);
        let fs = FileSystem::mount(disk).unwrap();
        let a = fs.create().unwrap();

        let data = vec![0x42u8; BLOCK_SIZE * 6];
        let written = fs.write(a, &data, 0).unwrap();
        assert_eq!(written, BLOCK_SIZE * 6);
        assert_eq!(fs.stat(a), Some((BLOCK_SIZE * 6) as u32));

        let mut readback = vec![0u8; BLOCK_SIZE * 6];
        let read = fs.read(a, &mut readback, 0).unwrap();
        assert_eq!(read, BLOCK_SIZE * 6);
        assert_eq!(readback, data);
    }

    #[test]
    fn remove_frees_all_blocks_and_inumber_is_recycled() {
        let disk = formatted_disk(20);
        let fs = FileSystem::mount(disk).unwrap();
        let a = fs.create().unwrap();
        fs.write(a, &vec![1u8; BLOCK_SIZE * 6], 0).unwrap();

        assert!(fs.remove(a));
        assert_eq!(fs.stat(a), None);
        assert!(!fs.remove(a));

        let recycled = fs.create().unwrap();
        assert_eq!(recycled, a);
    }

    #[test]
    fn disk_full_produces_short_write_with_consistent_pointers() {
        // 12 blocks total: block 0 is the superblock, inode_blocks = ceil(12/10) = 2 so
        // blocks 1-2 hold the inode table, leaving 9 data blocks (3-11).
        let disk = formatted_disk(12);
        let fs = FileSystem::mount(disk).unwrap();
        let a = fs.create().unwrap();

        let data = vec![7u8; BLOCK_SIZE * 20];
        let written = fs.write(a, &data, 0).unwrap();
        assert!(written < data.len());
        assert_eq!(fs.stat(a), Some(written as u32));

        // Every byte actually reported as written reads back correctly.
        let mut readback = vec![0u8; written];
        assert_eq!(fs.read(a, &mut readback, 0).unwrap(), written);
        assert_eq!(readback, data[..written]);
    }

    #[test]
    fn write_beyond_max_file_size_returns_zero() {
        let disk = formatted_disk(2000);
        let fs = FileSystem::mount(disk).unwrap();
        let a = fs.create().unwrap();
        let whole = vec![9u8; MAX_FILE_SIZE as usize];
        let written = fs.write(a, &whole, 0).unwrap();
        assert_eq!(written, MAX_FILE_SIZE as usize);
        assert_eq!(fs.write(a, b"one more byte", MAX_FILE_SIZE as u32), Some(0));
    }

    #[test]
    fn bitmap_matches_reconstruction_after_arbitrary_operations() {
        let disk = formatted_disk(30);
        let fs = FileSystem::mount(disk).unwrap();
        let a = fs.create().unwrap();
        fs.write(a, &vec![1u8; BLOCK_SIZE * 7], 0).unwrap();
        let b = fs.create().unwrap();
        fs.write(b, b"small", 0).unwrap();
        fs.remove(a);

        let live = fs.bitmap.borrow().snapshot();
        let reconstructed =
            Bitmap::reconstruct(&fs.disk, fs.inode_blocks, fs.inodes).unwrap().snapshot();
        assert_eq!(live, reconstructed);
    }

    #[test]
    fn end_to_end_scenario_from_specification() {
        let disk = MemDisk::new(20);
        assert!(format(&disk));
        let fs = FileSystem::mount(disk).unwrap();
        assert_eq!(fs.block_count(), 20);
        assert_eq!(fs.inode_block_count(), 2);
        assert_eq!(fs.inode_count(), 256);

        let a = fs.create().unwrap();
        assert_eq!(a, 0);
        assert_eq!(fs.stat(a), Some(0));
        let b = fs.create().unwrap();
        assert_eq!(b, 1);

        assert_eq!(fs.write(a, b"hello", 0), Some(5));
        assert_eq!(fs.stat(a), Some(5));
        let mut buf = [0u8; 5];
        assert_eq!(fs.read(a, &mut buf, 0), Some(5));
        assert_eq!(&buf, b"hello");

        let big = vec![0xcdu8; BLOCK_SIZE * 6];
        assert_eq!(fs.write(a, &big, 0), Some(BLOCK_SIZE * 6));
        assert_eq!(fs.stat(a), Some((BLOCK_SIZE * 6) as u32));

        assert!(fs.remove(a));
        let recreated = fs.create().unwrap();
        assert_eq!(recreated, 0);
        assert_eq!(fs.stat(b), Some(0));
    }
}
