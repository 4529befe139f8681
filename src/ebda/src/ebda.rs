// Copyright 2024 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::mem::{offset_of, size_of};

use log::debug;
use vm_memory::{Bytes, GuestAddress, GuestMemory};
use zerocopy::{Immutable, IntoBytes};

use crate::layout::{EBDA_PADDING_SIZE, EBDA_START, MPC_TABLE_OFFSET, MPF_INTEL_OFFSET};
use crate::{MpcTable, MpfIntel, Result};

// clippy doesn't understand that we actually "use" the fields of this struct when we serialize
// them as bytes in guest memory, so here we just ignore dead code to avoid having to name
// everything with an underscore prefix
#[allow(dead_code)]
/// Extended BIOS Data Area
///
/// Image of the EBDA as seen by the guest: zeroed padding, the MP floating pointer and the MP
/// configuration table, back to back.
#[repr(C, packed)]
#[derive(Clone, Copy, Debug, IntoBytes, Immutable)]
pub struct Ebda {
    padding: [u8; EBDA_PADDING_SIZE],
    mpf_intel: MpfIntel,
    mpc_table: MpcTable,
}

const _: () = assert!(offset_of!(Ebda, mpf_intel) == MPF_INTEL_OFFSET);
const _: () = assert!(offset_of!(Ebda, mpc_table) == MPC_TABLE_OFFSET);

impl Ebda {
    /// Builds the EBDA describing `num_cpus` vCPUs.
    pub fn new(num_cpus: usize) -> Result<Self> {
        let mpf_intel = MpfIntel::new();
        let mpc_table = MpcTable::new(num_cpus)?;
        debug!(
            "ebda: Built MP tables for {num_cpus} vCPUs, {} bytes",
            size_of::<Self>()
        );

        Ok(Ebda {
            padding: [0; EBDA_PADDING_SIZE],
            mpf_intel,
            mpc_table,
        })
    }

    /// Serialized EBDA, ready to be copied to guest memory.
    pub fn as_slice(&self) -> &[u8] {
        self.as_bytes()
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    pub fn len(&self) -> usize {
        size_of::<Self>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn mpf_intel(&self) -> &MpfIntel {
        &self.mpf_intel
    }

    pub fn mpc_table(&self) -> &MpcTable {
        &self.mpc_table
    }

    /// Write the EBDA in guest memory at `address`.
    pub fn write_to_guest<M: GuestMemory>(&self, mem: &M, address: GuestAddress) -> Result<()> {
        mem.write_slice(self.as_bytes(), address)?;
        debug!(
            "ebda: Wrote {} bytes at address {:#010x}",
            self.len(),
            address.0
        );
        Ok(())
    }
}

/// Returns the serialized EBDA describing `num_cpus` vCPUs.
pub fn build_ebda(num_cpus: usize) -> Result<Vec<u8>> {
    Ebda::new(num_cpus).map(|ebda| ebda.to_vec())
}

/// Performs setup of the EBDA for the given `num_cpus` at [`EBDA_START`].
pub fn setup_ebda<M: GuestMemory>(mem: &M, num_cpus: usize) -> Result<()> {
    Ebda::new(num_cpus)?.write_to_guest(mem, GuestAddress(u64::from(EBDA_START)))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use vm_memory::GuestMemoryMmap;

    use super::*;
    use crate::{EbdaError, MAX_SUPPORTED_CPUS};

    const MPF_INTEL_SIZE: usize = 16;
    const MPC_HEADER_SIZE: usize = 44;
    const MPC_CPU_SIZE: usize = 20;
    const EBDA_SIZE: usize = EBDA_PADDING_SIZE
        + MPF_INTEL_SIZE
        + MPC_HEADER_SIZE
        + MPC_CPU_SIZE * MAX_SUPPORTED_CPUS;

    fn byte_sum(bytes: &[u8]) -> u8 {
        bytes.iter().fold(0u8, |acc, x| acc.wrapping_add(*x))
    }

    fn mpf_intel_bytes(ebda: &[u8]) -> &[u8] {
        &ebda[MPF_INTEL_OFFSET..MPF_INTEL_OFFSET + MPF_INTEL_SIZE]
    }

    fn mpc_table_bytes(ebda: &[u8]) -> &[u8] {
        &ebda[MPC_TABLE_OFFSET..]
    }

    fn cpu_entry(ebda: &[u8], cpu_id: usize) -> &[u8] {
        let start = MPC_TABLE_OFFSET + MPC_HEADER_SIZE + cpu_id * MPC_CPU_SIZE;
        &ebda[start..start + MPC_CPU_SIZE]
    }

    fn guest_mem(size: usize) -> GuestMemoryMmap {
        GuestMemoryMmap::from_ranges(&[(GuestAddress(u64::from(EBDA_START)), size)]).unwrap()
    }

    #[test]
    fn test_region_size() {
        let ebda = Ebda::new(1).unwrap();
        assert_eq!(ebda.len(), EBDA_SIZE);
        assert_eq!(ebda.as_slice().len(), 1388);
        assert_eq!(ebda.mpc_table().len(), EBDA_SIZE - MPC_TABLE_OFFSET);
    }

    #[test]
    fn test_padding() {
        let bytes = build_ebda(MAX_SUPPORTED_CPUS).unwrap();
        assert!(bytes[..EBDA_PADDING_SIZE].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_checksums() {
        for num_cpus in 0..=MAX_SUPPORTED_CPUS {
            let bytes = build_ebda(num_cpus).unwrap();
            assert_eq!(byte_sum(mpf_intel_bytes(&bytes)), 0, "num_cpus = {num_cpus}");
            assert_eq!(byte_sum(mpc_table_bytes(&bytes)), 0, "num_cpus = {num_cpus}");
        }
    }

    #[test]
    fn test_cpu_flags() {
        for num_cpus in 0..=MAX_SUPPORTED_CPUS {
            let bytes = build_ebda(num_cpus).unwrap();
            for cpu_id in 0..MAX_SUPPORTED_CPUS {
                let entry = cpu_entry(&bytes, cpu_id);
                if cpu_id >= num_cpus {
                    assert!(entry.iter().all(|b| *b == 0));
                } else if cpu_id == 0 {
                    assert_eq!(entry[3], 0b11);
                } else {
                    assert_eq!(entry[3], 0b01);
                }
            }
        }
    }

    #[test]
    fn test_single_cpu() {
        let bytes = build_ebda(1).unwrap();
        let entry = cpu_entry(&bytes, 0);

        assert_eq!(entry[0], 0);
        assert_eq!(entry[1], 0);
        assert_eq!(entry[2], 0x14);
        assert_eq!(entry[3], 0b11);
        assert_eq!(&entry[4..8], &0x600u32.to_le_bytes());
        assert_eq!(&entry[8..12], &0x201u32.to_le_bytes());
        assert_eq!(&entry[12..20], &[0u8; 8]);
        // OEMCount
        assert_eq!(&bytes[98..100], &64u16.to_le_bytes());
    }

    #[test]
    fn test_no_cpus() {
        let bytes = build_ebda(0).unwrap();
        for cpu_id in 0..MAX_SUPPORTED_CPUS {
            assert!(cpu_entry(&bytes, cpu_id).iter().all(|b| *b == 0));
        }
        assert_eq!(byte_sum(mpc_table_bytes(&bytes)), 0);
    }

    #[test]
    fn test_physptr_is_constant() {
        let expected = (EBDA_START + 0x40).to_le_bytes();
        for num_cpus in 0..=MAX_SUPPORTED_CPUS {
            let ebda = Ebda::new(num_cpus).unwrap();
            assert_eq!(ebda.mpf_intel().physptr(), EBDA_START + 0x40);
            assert_eq!(&ebda.as_slice()[52..56], &expected);
        }
    }

    #[test]
    fn test_deterministic() {
        for num_cpus in 0..=MAX_SUPPORTED_CPUS {
            assert_eq!(build_ebda(num_cpus).unwrap(), build_ebda(num_cpus).unwrap());
        }
    }

    #[test]
    fn test_too_many_cpus() {
        let err = build_ebda(MAX_SUPPORTED_CPUS + 1).unwrap_err();
        assert!(matches!(err, EbdaError::InvalidCpuCount(65)));
    }

    proptest! {
        #[test]
        fn test_rejects_cpu_counts_above_max(num_cpus in (MAX_SUPPORTED_CPUS + 1)..usize::MAX) {
            let result = Ebda::new(num_cpus);
            prop_assert!(matches!(result, Err(EbdaError::InvalidCpuCount(n)) if n == num_cpus));
        }
    }

    #[test]
    fn test_setup_ebda() {
        let num_cpus = 4;
        let mem = guest_mem(EBDA_SIZE);

        setup_ebda(&mem, num_cpus).unwrap();

        let mut mpf_intel = [0u8; MPF_INTEL_SIZE];
        mem.read_slice(
            &mut mpf_intel,
            GuestAddress(u64::from(EBDA_START) + MPF_INTEL_OFFSET as u64),
        )
        .unwrap();
        assert_eq!(&mpf_intel[0..4], b"_MP_");
        assert_eq!(byte_sum(&mpf_intel), 0);

        let physptr = u32::from_le_bytes(mpf_intel[4..8].try_into().unwrap());
        let mut mpc_table = vec![0u8; EBDA_SIZE - MPC_TABLE_OFFSET];
        mem.read_slice(&mut mpc_table, GuestAddress(u64::from(physptr)))
            .unwrap();
        assert_eq!(&mpc_table[0..4], b"PCMP");
        assert_eq!(byte_sum(&mpc_table), 0);

        let mut image = vec![0u8; EBDA_SIZE];
        mem.read_slice(&mut image, GuestAddress(u64::from(EBDA_START)))
            .unwrap();
        assert_eq!(image, build_ebda(num_cpus).unwrap());
    }

    #[test]
    fn test_setup_ebda_not_enough_memory() {
        let mem = guest_mem(EBDA_SIZE - 1);
        let err = setup_ebda(&mem, 1).unwrap_err();
        assert!(matches!(err, EbdaError::GuestMemory(_)));
    }

    #[test]
    fn test_setup_ebda_too_many_cpus() {
        let mem = guest_mem(EBDA_SIZE);
        let err = setup_ebda(&mem, MAX_SUPPORTED_CPUS + 1).unwrap_err();
        assert!(matches!(err, EbdaError::InvalidCpuCount(65)));

        let mut image = vec![0xffu8; EBDA_SIZE];
        mem.read_slice(&mut image, GuestAddress(u64::from(EBDA_START)))
            .unwrap();
        assert!(image.iter().all(|b| *b == 0));
    }
}
