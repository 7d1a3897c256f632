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

//! `sfs` is a small inode-based file system.
//!
//! It layers a C-style file API (create, remove, stat, read, write), indexed by opaque
//! integer "inumbers", on top of a fixed-size block device. There are no directories and no
//! filenames: every file is anonymous, addressed by its inumber.
//!
//! The three pieces that matter are [`layout`] (the byte-exact on-disk format), [`bitmap`] (the
//! in-memory free-block allocator, rebuilt at mount from the on-disk inode graph) and [`fs`]
//! (the inode engine built on top of both). [`block`] provides the block device abstraction the
//! rest of the crate is generic over, plus the two concrete devices the crate ships.

pub mod bitmap;
pub mod block;
pub mod fs;
pub mod inode_table;
pub mod layout;
pub mod util;

pub use block::{BlockDevice, FileDisk, MemDisk};
pub use fs::{debug, format, FileSystem};
pub use layout::{BLOCK_SIZE, INODES_PER_BLOCK, MAGIC_NUMBER, POINTERS_PER_BLOCK, POINTERS_PER_INODE};
