// Copyright 2024 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::mem::size_of;

use zerocopy::little_endian::{U16, U32};
use zerocopy::{Immutable, IntoBytes};

use crate::layout::apic_addr;
use crate::{EbdaError, MAX_SUPPORTED_CPUS, MP_SPEC_REVISION, MpcCpu, Result, checksum};

const MPC_SIGNATURE: [u8; 4] = *b"PCMP";

#[allow(clippy::cast_possible_truncation)]
const MPC_TABLE_LENGTH: u16 = {
    assert!(size_of::<MpcTable>() <= u16::MAX as usize);
    size_of::<MpcTable>() as u16
};

// Guest kernels are told every slot holds an entry, including the zeroed ones past the last
// vCPU. Kept for compatibility with the guests this table has been validated against.
#[allow(clippy::cast_possible_truncation)]
const MPC_ENTRY_COUNT: u16 = MAX_SUPPORTED_CPUS as u16;

// clippy doesn't understand that we actually "use" the fields of this struct when we serialize
// them as bytes in guest memory, so here we just ignore dead code to avoid having to name
// everything with an underscore prefix
#[allow(dead_code)]
/// MP Configuration Table
///
/// Header of the table followed by a fixed number of processor entries. The table always spans
/// [`MAX_SUPPORTED_CPUS`] slots, whatever the number of vCPUs, so that its length is constant.
/// More information about this table can be found in the Intel MultiProcessor Specification 1.4,
/// section 4.2.
#[repr(C, packed)]
#[derive(Clone, Copy, Debug, IntoBytes, Immutable)]
pub struct MpcTable {
    signature: [u8; 4],
    length: U16,
    spec: u8,
    checksum: u8,
    oem: [u8; 8],
    productid: [u8; 12],
    oemptr: U32,
    oemsize: U16,
    oemcount: U16,
    lapic: U32,
    reserved: U32,
    cpus: [MpcCpu; MAX_SUPPORTED_CPUS],
}

const _: () = assert!(size_of::<MpcTable>() == 44 + 20 * MAX_SUPPORTED_CPUS);

impl MpcTable {
    /// Builds the table for `num_cpus` vCPUs with APIC IDs `0..num_cpus`.
    pub fn new(num_cpus: usize) -> Result<Self> {
        if num_cpus > MAX_SUPPORTED_CPUS {
            return Err(EbdaError::InvalidCpuCount(num_cpus));
        }

        let mut cpus = [MpcCpu::default(); MAX_SUPPORTED_CPUS];
        for (cpu_id, cpu) in (0u8..).zip(cpus.iter_mut().take(num_cpus)) {
            *cpu = MpcCpu::new(cpu_id);
        }

        let mut table = MpcTable {
            signature: MPC_SIGNATURE,
            length: U16::new(MPC_TABLE_LENGTH),
            spec: MP_SPEC_REVISION,
            checksum: 0,
            oem: [0; 8],
            productid: [0; 12],
            oemptr: U32::ZERO,
            oemsize: U16::ZERO,
            oemcount: U16::new(MPC_ENTRY_COUNT),
            lapic: U32::new(apic_addr(0)),
            reserved: U32::ZERO,
            cpus,
        };
        table.checksum = checksum(table.as_bytes());

        Ok(table)
    }

    /// Length of the table in bytes, as advertised in its header.
    pub fn len(&self) -> usize {
        usize::from(self.length.get())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Processor entry slots, including the unused zeroed ones.
    pub fn cpus(&self) -> &[MpcCpu; MAX_SUPPORTED_CPUS] {
        &self.cpus
    }
}
