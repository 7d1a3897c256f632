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

//! `sfsutil` is a thin command line front-end over the `sfs` library: `format` lays a fresh
//! image on a device file, `debug` prints its superblock and inode table.

use sfs::BlockDevice;
use std::env::{self, ArgsOs};
use std::fmt;
use std::path::PathBuf;
use std::process::exit;

/// Writes an error to stderr, then exits with status 1.
fn error<M: fmt::Display>(msg: M) -> ! {
    eprintln!("sfsutil: error: {msg}");
    exit(1);
}

fn usage() -> ! {
    eprintln!("usage:");
    eprintln!("    sfsutil format <image>");
    eprintln!("    sfsutil debug <image>");
    exit(1);
}

/// Lays a fresh image on `image`, sized to the file's current length. The file must already
/// exist at the desired size (e.g. created with `truncate -s <size> <image>`).
fn cmd_format(mut args: ArgsOs) {
    let image = args.next().map(PathBuf::from).unwrap_or_else(|| usage());
    let disk = sfs::FileDisk::open(&image)
        .unwrap_or_else(|e| error(format_args!("{}: {e}", image.display())));
    if !sfs::format(&disk) {
        error(format_args!("{}: could not format image", image.display()));
    }
    println!("{}: formatted, {} blocks", image.display(), disk.block_count());
}

fn cmd_debug(mut args: ArgsOs) {
    let image = args.next().map(PathBuf::from).unwrap_or_else(|| usage());
    let disk = sfs::FileDisk::open(&image)
        .unwrap_or_else(|e| error(format_args!("{}: {e}", image.display())));
    sfs::debug(&disk);
}

fn main() {
    let mut args = env::args_os();
    args.next(); // skip argv[0]
    match args.next().and_then(|a| a.to_str().map(str::to_owned)) {
        Some(cmd) if cmd == "format" => cmd_format(args),
        Some(cmd) if cmd == "debug" => cmd_debug(args),
        _ => usage(),
    }
}
