// Copyright 2024 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Builds the Extended BIOS Data Area (EBDA) image that exposes the vCPU topology of an x86
//! guest through the Intel MultiProcessor Specification 1.4 structures.
//!
//! The image consists of a zeroed padding block, the MP floating pointer structure and the MP
//! configuration table with one processor entry per vCPU. It is meant to be copied verbatim at
//! [`layout::EBDA_START`] in guest physical memory.

use vm_memory::GuestMemoryError;

pub mod cpu;
pub mod ebda;
pub mod layout;
pub mod mpc_table;
pub mod mpf_intel;

pub use cpu::MpcCpu;
pub use ebda::{Ebda, build_ebda, setup_ebda};
pub use mpc_table::MpcTable;
pub use mpf_intel::MpfIntel;

/// Maximum number of vCPUs that can be described by the MP configuration table.
pub const MAX_SUPPORTED_CPUS: usize = 64;

// Revision 1.4 of the Intel MP Specification.
const MP_SPEC_REVISION: u8 = 4;

/// Computes the MP checksum byte of `buf`.
///
/// The returned value is the two's complement of the byte sum, so that the sum of every byte of
/// a structure, checksum included, is zero modulo 256. `buf` must hold the structure with its
/// checksum field still set to zero.
pub fn checksum(buf: &[u8]) -> u8 {
    buf.iter()
        .fold(0u8, |acc, x| acc.wrapping_add(*x))
        .wrapping_neg()
}

#[derive(Debug, thiserror::Error, displaydoc::Display)]
pub enum EbdaError {
    /// The number of vCPUs must be less than or equal to 64, got {0}
    InvalidCpuCount(usize),
    /// Failed to write the EBDA to guest memory: {0}
    GuestMemory(#[from] GuestMemoryError),
}

pub type Result<T> = std::result::Result<T, EbdaError>;
