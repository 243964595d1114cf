use std::sync::atomic::{fence, Ordering};

/// Write barrier: stores issued before this call are visible to the device
/// before any store issued after it.
#[inline(always)]
pub fn wmb() {
    #[cfg(target_arch = "x86_64")]
    #[allow(unused_unsafe)]
    unsafe {
        std::arch::x86_64::_mm_sfence()
    };
    fence(Ordering::Release);
}

/// Read barrier: loads issued after this call are not satisfied before
/// loads issued before it.
#[inline(always)]
pub fn rmb() {
    #[cfg(target_arch = "x86_64")]
    #[allow(unused_unsafe)]
    unsafe {
        std::arch::x86_64::_mm_lfence()
    };
    fence(Ordering::Acquire);
}
