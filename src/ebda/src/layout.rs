// Copyright 2024 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Magic addresses and offsets used to lay out the EBDA of x86_64 guests.

/// Start of the Extended BIOS Data Area, i.e. the last 1 KiB of the first 640 KiB of memory.
pub const EBDA_START: u32 = 0x0009_fc00;

/// Size of the window at the start of the EBDA that guest kernels scan for the MP floating
/// pointer.
pub const EBDA_SCAN_SIZE: usize = 1024;

/// Zeroed bytes placed in front of the MP floating pointer.
///
/// The floating pointer has to sit on a 16 byte boundary inside the first KiB of the EBDA.
/// source: linux/arch/x86/kernel/mpparse.c
pub const EBDA_PADDING_SIZE: usize = 16 * 3;

/// Offset of the MP floating pointer structure inside the EBDA.
pub const MPF_INTEL_OFFSET: usize = EBDA_PADDING_SIZE;
const _: () = assert!(MPF_INTEL_OFFSET % 16 == 0 && MPF_INTEL_OFFSET < EBDA_SCAN_SIZE);

/// Offset of the MP configuration table inside the EBDA.
pub const MPC_TABLE_OFFSET: usize = 0x40;

/// Physical base address of the local APIC of the first CPU.
pub const APIC_DEFAULT_PHYS_BASE: u32 = 0xfee0_0000; // source: linux/arch/x86/include/asm/apicdef.h

/// Distance between the local APIC windows of consecutive APIC IDs.
pub const APIC_BASE_ADDR_STEP: u32 = 0x0040_0000;

/// Returns the physical address of the local APIC with the given ID.
pub const fn apic_addr(apic_id: u32) -> u32 {
    APIC_DEFAULT_PHYS_BASE + apic_id * APIC_BASE_ADDR_STEP
}
