use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// Offset of the send doorbell inside the device's user access region.
pub const SEND_DOORBELL_OFFSET: u64 = 0x14;

/// The single register write that tells the device new transmit work is
/// posted.
pub trait Doorbell: Send {
    fn ring(&mut self, value: u32);
}

#[cfg(target_os = "linux")]
pub use mmio::MmioDoorbell;

#[cfg(target_os = "linux")]
mod mmio {
    use std::fs::OpenOptions;
    use std::io;
    use std::path::Path;
    use std::ptr;

    use memmap2::{MmapMut, MmapOptions};

    use super::Doorbell;

    /// Doorbell register reached through a mapped device resource, e.g. a
    /// PCI BAR exposed under sysfs.
    pub struct MmioDoorbell {
        map: MmapMut,
        offset: usize,
    }

    impl MmioDoorbell {
        pub fn open<P: AsRef<Path>>(resource: P, reg_offset: u64) -> io::Result<Self> {
            if reg_offset % 4 != 0 {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "doorbell register must be 4-byte aligned",
                ));
            }
            let page = page_size();
            let map_offset = reg_offset & !(page - 1);
            let offset = (reg_offset - map_offset) as usize;

            let file = OpenOptions::new().read(true).write(true).open(resource)?;
            let map = unsafe {
                MmapOptions::new()
                    .offset(map_offset)
                    .len(page as usize)
                    .map_mut(&file)?
            };
            Ok(Self { map, offset })
        }
    }

    impl Doorbell for MmioDoorbell {
        #[inline]
        fn ring(&mut self, value: u32) {
            unsafe {
                let reg = self.map.as_mut_ptr().add(self.offset) as *mut u32;
                ptr::write_volatile(reg, value.to_be());
            }
        }
    }

    fn page_size() -> u64 {
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if size <= 0 {
            4096
        } else {
            size as u64
        }
    }
}

/// Doorbell that only counts writes. Used by simulated devices; a
/// `DoorbellProbe` observes it from outside the ring lock.
pub struct CountingDoorbell {
    state: Arc<ProbeState>,
}

#[derive(Default)]
struct ProbeState {
    rings: AtomicU64,
    last: AtomicU32,
}

#[derive(Clone)]
pub struct DoorbellProbe {
    state: Arc<ProbeState>,
}

impl CountingDoorbell {
    pub fn new() -> (Self, DoorbellProbe) {
        let state = Arc::new(ProbeState::default());
        (
            Self { state: state.clone() },
            DoorbellProbe { state },
        )
    }
}

impl Doorbell for CountingDoorbell {
    fn ring(&mut self, value: u32) {
        self.state.last.store(value, Ordering::Relaxed);
        self.state.rings.fetch_add(1, Ordering::Release);
    }
}

impl DoorbellProbe {
    pub fn rings(&self) -> u64 {
        self.state.rings.load(Ordering::Acquire)
    }

    pub fn last_value(&self) -> u32 {
        self.state.last.load(Ordering::Relaxed)
    }
}
