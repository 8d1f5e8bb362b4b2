use std::mem::MaybeUninit;
use std::sync::OnceLock;

use windows_sys::Win32::System::SystemInformation::{GetSystemInfo, SYSTEM_INFO};

use crate::storage::Advice;

struct PageInfo {
    page_size: usize,
    granularity: usize,
}

static PAGE_INFO: OnceLock<PageInfo> = OnceLock::new();

fn page_info() -> &'static PageInfo {
    PAGE_INFO.get_or_init(|| {
        // SAFETY: GetSystemInfo fully initializes the SYSTEM_INFO it is given
        // and cannot fail.
        let info = unsafe {
            let mut info = MaybeUninit::<SYSTEM_INFO>::uninit();
            GetSystemInfo(info.as_mut_ptr());
            info.assume_init()
        };

        PageInfo {
            page_size: info.dwPageSize as usize,
            granularity: info.dwAllocationGranularity as usize,
        }
    })
}

pub fn page_size() -> usize {
    page_info().page_size
}

/// MapViewOfFile offsets must be multiples of this value, typically 64KB.
pub fn allocation_granularity() -> usize {
    page_info().granularity
}

/// Windows has no madvise equivalent for file views.
pub fn advise(_ptr: *const u8, _len: usize, _advice: Advice) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn granularity_is_page_multiple() {
        assert!(page_size().is_power_of_two());
        assert_eq!(allocation_granularity() % page_size(), 0);
    }
}
