//-
// Copyright (c) 2024, Jason Lingle
//
// This file is part of Memoryhole.
//
// Memoryhole is free software: you can redistribute it and/or modify it under
// the terms of the  GNU General Public License as published  by the Free
// Software Foundation, either version 3 of  the License, or (at your option)
// any later version.
//
// Memoryhole is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY;  without even the  implied warranty of  MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General Public License for
// more details.
//
// You should have received a copy of the GNU General Public License along with
// Memoryhole. If not, see <http://www.gnu.org/licenses/>.

//! Memory Hole header protection: moving headers inside the signed and
//! encrypted part of a PGP/MIME message, and restoring them on receipt.

pub mod message;
pub mod policy;
pub mod protect;
pub mod protection;
pub mod unwrap;


pub use self::message::{HeaderReplacement, MemoryHoleMessage};
pub use self::policy::{HeaderDisposition, HeaderPolicy};
pub use self::protect::{protect, Protector};
pub use self::protection::{Fingerprint, ProtectionLevel};
pub use self::unwrap::{unwrap, unwrap_with_config};
