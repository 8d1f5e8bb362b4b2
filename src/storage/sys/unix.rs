use std::sync::OnceLock;

use crate::storage::Advice;

/// Used if `sysconf` cannot report a page size.
const FALLBACK_PAGE_SIZE: usize = 4096;

static PAGE_SIZE: OnceLock<usize> = OnceLock::new();

pub fn page_size() -> usize {
    *PAGE_SIZE.get_or_init(|| {
        // SAFETY: sysconf has no preconditions and only reads system configuration.
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if size > 0 {
            size as usize
        } else {
            FALLBACK_PAGE_SIZE
        }
    })
}

/// mmap offsets only need page alignment on POSIX.
pub fn allocation_granularity() -> usize {
    page_size()
}

pub fn advise(ptr: *const u8, len: usize, advice: Advice) {
    if len == 0 {
        return;
    }

    let flag = match advice {
        Advice::Normal => libc::MADV_NORMAL,
        Advice::Sequential => libc::MADV_SEQUENTIAL,
        Advice::Random => libc::MADV_RANDOM,
        Advice::WillNeed => libc::MADV_WILLNEED,
    };

    // SAFETY: madvise is a hint to the kernel and does not cause undefined
    // behavior even if the range is invalid. Callers pass the base and length of
    // a live mapping whose file offset is granularity aligned, so the address is
    // page aligned as madvise requires.
    let rc = unsafe { libc::madvise(ptr as *mut libc::c_void, len, flag) };
    if rc != 0 {
        tracing::trace!(
            ?advice,
            len,
            error = %std::io::Error::last_os_error(),
            "madvise ignored"
        );
    }
}
