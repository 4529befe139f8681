// Copyright 2024 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use zerocopy::little_endian::U32;
use zerocopy::{Immutable, IntoBytes};

use crate::layout::{EBDA_START, MPC_TABLE_OFFSET};
use crate::{MP_SPEC_REVISION, checksum};

const SMP_MAGIC_IDENT: [u8; 4] = *b"_MP_";

#[allow(clippy::cast_possible_truncation)]
const MPC_TABLE_ADDR: u32 = EBDA_START + MPC_TABLE_OFFSET as u32;

// clippy doesn't understand that we actually "use" the fields of this struct when we serialize
// them as bytes in guest memory, so here we just ignore dead code to avoid having to name
// everything with an underscore prefix
#[allow(dead_code)]
/// MP Floating Pointer Structure
///
/// This is the anchor guest kernels look for when enumerating processors. It points to the MP
/// configuration table, which is placed right after it in the EBDA.
#[repr(C, packed)]
#[derive(Clone, Copy, Debug, IntoBytes, Immutable)]
pub struct MpfIntel {
    signature: [u8; 4],
    physptr: U32,
    length: u8,
    specification: u8,
    checksum: u8,
    feature1: u8,
    feature2: u8,
    feature3: u8,
    feature4: u8,
    feature5: u8,
}

const _: () = assert!(std::mem::size_of::<MpfIntel>() == 16);

impl MpfIntel {
    pub fn new() -> Self {
        let mut mpf_intel = MpfIntel {
            signature: SMP_MAGIC_IDENT,
            physptr: U32::new(MPC_TABLE_ADDR),
            // Length in 16 byte units.
            length: 1,
            specification: MP_SPEC_REVISION,
            checksum: 0,
            feature1: 0,
            feature2: 0,
            feature3: 0,
            feature4: 0,
            feature5: 0,
        };
        mpf_intel.checksum = checksum(mpf_intel.as_bytes());
        mpf_intel
    }

    /// Guest physical address of the MP configuration table.
    pub fn physptr(&self) -> u32 {
        self.physptr.get()
    }
}

impl Default for MpfIntel {
    fn default() -> Self {
        Self::new()
    }
}
