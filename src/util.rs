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

//! Small formatting helpers shared by `debug` and the CLI front-end.

use std::fmt;

/// A byte count, formatted with a binary unit suffix (KiB, MiB, ...).
pub struct ByteSize(pub u64);

impl fmt::Display for ByteSize {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        const UNITS: [&str; 7] = ["bytes", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];
        let mut order = 0;
        let mut value = self.0;
        while value >= 1024 && order < UNITS.len() - 1 {
            value /= 1024;
            order += 1;
        }
        write!(fmt, "{} {}", value, UNITS[order])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_size_formatting() {
        assert_eq!(format!("{}", ByteSize(0)), "0 bytes");
        assert_eq!(format!("{}", ByteSize(1023)), "1023 bytes");
        assert_eq!(format!("{}", ByteSize(1024)), "1 KiB");
        assert_eq!(format!("{}", ByteSize(1024 * 1024)), "1 MiB");
        assert_eq!(format!("{}", ByteSize(1024 * 1024 * 1024)), "1 GiB");
    }
}
