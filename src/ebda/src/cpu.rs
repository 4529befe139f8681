// Copyright 2024 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use zerocopy::little_endian::U32;
use zerocopy::{Immutable, IntoBytes};

// Entry type of a processor entry in the MP configuration table.
const MP_PROCESSOR: u8 = 0;
const CPU_ENABLED: u8 = 1 << 0;
const CPU_BOOTPROCESSOR: u8 = 1 << 1;

const APIC_VERSION: u8 = 0x14;
const CPU_STEPPING: u32 = 0x600;
const CPU_FEATURE_APIC: u32 = 0x200;
const CPU_FEATURE_FPU: u32 = 0x001;

// clippy doesn't understand that we actually "use" the fields of this struct when we serialize
// them as bytes in guest memory, so here we just ignore dead code to avoid having to name
// everything with an underscore prefix
#[allow(dead_code)]
/// Processor entry of the MP configuration table.
///
/// An all-zero entry (the `Default` value) marks an unused slot.
#[repr(C, packed)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, IntoBytes, Immutable)]
pub struct MpcCpu {
    r#type: u8,
    apicid: u8,
    apicver: u8,
    cpuflag: u8,
    cpufeature: U32,
    featureflag: U32,
    reserved: [u8; 8],
}

const _: () = assert!(std::mem::size_of::<MpcCpu>() == 20);

impl MpcCpu {
    /// Describes the vCPU whose local APIC ID is `cpu_id`.
    ///
    /// vCPU 0 is reported as the boot processor.
    pub fn new(cpu_id: u8) -> Self {
        let mut cpuflag = CPU_ENABLED;
        if cpu_id == 0 {
            cpuflag |= CPU_BOOTPROCESSOR;
        }

        MpcCpu {
            r#type: MP_PROCESSOR,
            apicid: cpu_id,
            apicver: APIC_VERSION,
            cpuflag,
            cpufeature: U32::new(CPU_STEPPING),
            featureflag: U32::new(CPU_FEATURE_APIC | CPU_FEATURE_FPU),
            reserved: [0; 8],
        }
    }

    pub fn apic_id(&self) -> u8 {
        self.apicid
    }

    pub fn is_enabled(&self) -> bool {
        self.cpuflag & CPU_ENABLED != 0
    }

    pub fn is_boot_processor(&self) -> bool {
        self.cpuflag & CPU_BOOTPROCESSOR != 0
    }
}
