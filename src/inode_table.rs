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

//! Load/save of a single inode record by inumber, bounds-checked against the mounted
//! filesystem's inode count.

use crate::block::BlockDevice;
use crate::layout::{InodeRecord, BLOCK_SIZE};
use std::io;

/// Loads inode `inumber`. Returns `None` if `inumber >= inodes`.
pub fn load_inode(disk: &dyn BlockDevice, inodes: u32, inumber: u32) -> io::Result<Option<InodeRecord>> {
    if inumber >= inodes {
        return Ok(None);
    }
    let (block, slot) = InodeRecord::locate(inumber);
    let mut buf = [0u8; BLOCK_SIZE];
    disk.read_block(block, &mut buf)?;
    let off = slot * InodeRecord::SIZE;
    Ok(Some(InodeRecord::from_bytes(&buf[off..off + InodeRecord::SIZE])))
}

/// Read-modify-writes the inode block containing `inumber` to persist `record`. Returns
/// `false` if `inumber >= inodes`.
pub fn save_inode(
    disk: &dyn BlockDevice,
    inodes: u32,
    inumber: u32,
    record: InodeRecord,
) -> io::Result<bool> {
    if inumber >= inodes {
        return Ok(false);
    }
    let (block, slot) = InodeRecord::locate(inumber);
    let mut buf = [0u8; BLOCK_SIZE];
    disk.read_block(block, &mut buf)?;
    let off = slot * InodeRecord::SIZE;
    buf[off..off + InodeRecord::SIZE].copy_from_slice(&record.to_bytes());
    disk.write_block(block, &buf)?;
    Ok(true)
}
