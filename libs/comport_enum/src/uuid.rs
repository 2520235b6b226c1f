// NOTE: we break the Uuid's data down into four fields (annotated with the corresponding component
//       labels from RFC 4122; the last three RFC fields are combined into an 8-octet sequence to
//       match convention)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Uuid {
    pub data1: u32,     // time-low
    pub data2: u16,     // time-mid
    pub data3: u16,     // time-high-and-version
    pub data4: [u8; 8], // clock-seq-and-reserved | clock-seq-low | node[6]
}

impl Uuid {
    pub const fn from_u128(uuid_as_u128: u128) -> Self {
        Self {
            data1: ((uuid_as_u128 >> 96) & 0xFFFF_FFFF) as u32,
            data2: ((uuid_as_u128 >> 80) & 0xFFFF) as u16,
            data3: ((uuid_as_u128 >> 64) & 0xFFFF) as u16,
            data4: ((uuid_as_u128 & 0xFFFF_FFFF_FFFF_FFFF) as u64).to_be_bytes(),
        }
    }

    pub fn as_u128(&self) -> u128 {
        ((self.data1 as u128) << 96)
            | ((self.data2 as u128) << 80)
            | ((self.data3 as u128) << 64)
            | (u64::from_be_bytes(self.data4) as u128)
    }
}

#[cfg(target_os = "windows")]
impl From<windows_sys::core::GUID> for Uuid {
    fn from(value: windows_sys::core::GUID) -> Self {
        Self {
            data1: value.data1,
            data2: value.data2,
            data3: value.data3,
            data4: value.data4,
        }
    }
}

#[cfg(target_os = "windows")]
impl From<Uuid> for windows_sys::core::GUID {
    fn from(value: Uuid) -> Self {
        Self {
            data1: value.data1,
            data2: value.data2,
            data3: value.data3,
            data4: value.data4,
        }
    }
}

// NOTE: the lowercase hyphenated rendering here is the one that appears inside device interface
//       paths (e.g. "...#{f18a0e88-c30c-11d0-8815-00a0c906bed8}")
impl std::fmt::Display for Uuid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            self.data1,
            self.data2,
            self.data3,
            self.data4[0],
            self.data4[1],
            self.data4[2],
            self.data4[3],
            self.data4[4],
            self.data4[5],
            self.data4[6],
            self.data4[7],
        )
    }
}
