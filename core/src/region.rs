//! The named cross-process shared region.
//!
//! A fixed-size POSIX shared memory segment (`shm_open` + `mmap`) holding
//! three native-integer slots: tower pid, radio pid, reserved. Each slot has
//! exactly one writer during its active phase, so slot access needs no lock;
//! loads and stores go through [`AtomicI32`] views into the mapping.
//!
//! The creator unlinks the name on [`SharedRegion::destroy`]; openers (the
//! radio) only unmap. Destroy is idempotent because shutdown code attempts it
//! defensively.

use std::ffi::CString;
use std::io;
use std::mem;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicPtr, Ordering};

use tracing::{debug, warn};

use aircontrol_types::Slot;

use crate::errors::SetupError;

const REGION_LEN: usize = Slot::COUNT * size_of::<libc::c_int>();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    /// Created the segment; unlinks the name on destroy.
    Creator,
    /// Opened an existing segment; never unlinks.
    Opener,
}

/// A mapped view of the shared region.
///
/// Reads on a destroyed region yield `0` (the "collaborator not ready"
/// value) and writes are dropped; neither panics, since workers may race a
/// defensive destroy during shutdown.
pub struct SharedRegion {
    name: CString,
    base: AtomicPtr<AtomicI32>,
    role: Role,
    unlinked: AtomicBool,
}

// The mapping is shared between threads; slot access is atomic and the
// base pointer is only ever swapped to null (by destroy).
unsafe impl Send for SharedRegion {}
unsafe impl Sync for SharedRegion {}

impl SharedRegion {
    /// Create the region under `name`, zero-filled.
    ///
    /// Fails fast with [`SetupError::RegionExists`] if the name is already
    /// present rather than silently reusing a stale mapping.
    pub fn create(name: &str) -> Result<Self, SetupError> {
        let cname = c_name(name)?;
        let fd = unsafe {
            libc::shm_open(
                cname.as_ptr(),
                libc::O_CREAT | libc::O_EXCL | libc::O_RDWR,
                0o666,
            )
        };
        if fd == -1 {
            let source = io::Error::last_os_error();
            if source.kind() == io::ErrorKind::AlreadyExists {
                return Err(SetupError::RegionExists {
                    name: name.to_string(),
                });
            }
            return Err(SetupError::RegionCreate {
                name: name.to_string(),
                source,
            });
        }

        if unsafe { libc::ftruncate(fd, REGION_LEN as libc::off_t) } == -1 {
            let source = io::Error::last_os_error();
            unsafe {
                libc::close(fd);
                libc::shm_unlink(cname.as_ptr());
            }
            return Err(SetupError::RegionCreate {
                name: name.to_string(),
                source,
            });
        }

        let base = map_fd(fd).map_err(|source| {
            unsafe {
                libc::shm_unlink(cname.as_ptr());
            }
            SetupError::RegionCreate {
                name: name.to_string(),
                source,
            }
        })?;

        let region = Self {
            name: cname,
            base: AtomicPtr::new(base),
            role: Role::Creator,
            unlinked: AtomicBool::new(false),
        };
        // ftruncate already zero-fills, but the zeroed slots are part of the
        // region's contract, so write them explicitly.
        for slot in [Slot::Tower, Slot::Radio, Slot::Reserved] {
            region.write_slot(slot, 0);
        }
        Ok(region)
    }

    /// Open an existing region by name, validating its size against the
    /// expected layout. Used by the radio process and by tests.
    pub fn open(name: &str) -> Result<Self, SetupError> {
        let cname = c_name(name)?;
        let fd = unsafe { libc::shm_open(cname.as_ptr(), libc::O_RDWR, 0o666) };
        if fd == -1 {
            return Err(SetupError::RegionOpen {
                name: name.to_string(),
                source: io::Error::last_os_error(),
            });
        }

        let mut st: libc::stat = unsafe { mem::zeroed() };
        if unsafe { libc::fstat(fd, &mut st) } == -1 {
            let source = io::Error::last_os_error();
            unsafe {
                libc::close(fd);
            }
            return Err(SetupError::RegionOpen {
                name: name.to_string(),
                source,
            });
        }
        if (st.st_size as u64) < REGION_LEN as u64 {
            unsafe {
                libc::close(fd);
            }
            return Err(SetupError::RegionSize {
                name: name.to_string(),
                actual: st.st_size as u64,
                expected: REGION_LEN as u64,
            });
        }

        let base = map_fd(fd).map_err(|source| SetupError::RegionOpen {
            name: name.to_string(),
            source,
        })?;

        Ok(Self {
            name: cname,
            base: AtomicPtr::new(base),
            role: Role::Opener,
            unlinked: AtomicBool::new(false),
        })
    }

    /// Atomic load of one slot. A destroyed region reads as `0`.
    #[must_use]
    pub fn read_slot(&self, slot: Slot) -> i32 {
        let base = self.base.load(Ordering::Acquire);
        if base.is_null() {
            return 0;
        }
        unsafe { (*base.add(slot.index())).load(Ordering::SeqCst) }
    }

    /// Atomic store to one slot. Dropped (with a debug log) after destroy.
    pub fn write_slot(&self, slot: Slot, value: i32) {
        let base = self.base.load(Ordering::Acquire);
        if base.is_null() {
            debug!(?slot, value, "write to destroyed shared region dropped");
            return;
        }
        unsafe { (*base.add(slot.index())).store(value, Ordering::SeqCst) }
    }

    /// Unmap the region and, for the creator, remove the name from the
    /// system namespace. Idempotent; failures are logged and swallowed.
    pub fn destroy(&self) {
        let base = self.base.swap(ptr::null_mut(), Ordering::AcqRel);
        if !base.is_null() && unsafe { libc::munmap(base.cast(), REGION_LEN) } == -1 {
            warn!(
                name = %self.name.to_string_lossy(),
                error = %io::Error::last_os_error(),
                "failed to unmap shared region"
            );
        }

        if self.role == Role::Creator && !self.unlinked.swap(true, Ordering::AcqRel) {
            if unsafe { libc::shm_unlink(self.name.as_ptr()) } == -1 {
                let err = io::Error::last_os_error();
                // Someone else already unlinked it; still a clean shutdown.
                if err.raw_os_error() != Some(libc::ENOENT) {
                    warn!(
                        name = %self.name.to_string_lossy(),
                        error = %err,
                        "failed to unlink shared region"
                    );
                }
            }
        }
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn c_name(name: &str) -> Result<CString, SetupError> {
    CString::new(name).map_err(|_| SetupError::RegionName {
        name: name.to_string(),
    })
}

/// `mmap` the segment and close the descriptor (the mapping keeps the
/// segment alive).
fn map_fd(fd: libc::c_int) -> io::Result<*mut AtomicI32> {
    let base = unsafe {
        libc::mmap(
            ptr::null_mut(),
            REGION_LEN,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_SHARED,
            fd,
            0,
        )
    };
    let map_err = if base == libc::MAP_FAILED {
        Some(io::Error::last_os_error())
    } else {
        None
    };
    unsafe {
        libc::close(fd);
    }
    match map_err {
        Some(err) => Err(err),
        None => Ok(base.cast()),
    }
}

#[cfg(test)]
mod tests {
    use super::SharedRegion;
    use crate::errors::SetupError;
    use aircontrol_types::Slot;

    fn unique_name(tag: &str) -> String {
        format!("/actl-test-{}-{tag}", std::process::id())
    }

    #[test]
    fn create_zero_fills_and_round_trips_slots() {
        let name = unique_name("roundtrip");
        let region = SharedRegion::create(&name).expect("create");

        for slot in [Slot::Tower, Slot::Radio, Slot::Reserved] {
            assert_eq!(region.read_slot(slot), 0);
        }

        region.write_slot(Slot::Tower, 4321);
        assert_eq!(region.read_slot(Slot::Tower), 4321);
        assert_eq!(region.read_slot(Slot::Radio), 0);
    }

    #[test]
    fn create_refuses_an_existing_name() {
        let name = unique_name("exists");
        let _region = SharedRegion::create(&name).expect("create");

        let err = SharedRegion::create(&name)
            .err()
            .expect("second create must fail");
        assert!(matches!(err, SetupError::RegionExists { .. }));
    }

    #[test]
    fn opener_sees_the_creator_writes() {
        let name = unique_name("open");
        let creator = SharedRegion::create(&name).expect("create");
        creator.write_slot(Slot::Radio, 777);

        let opener = SharedRegion::open(&name).expect("open");
        assert_eq!(opener.read_slot(Slot::Radio), 777);

        // Opener drop must not unlink the name.
        drop(opener);
        assert_eq!(creator.read_slot(Slot::Radio), 777);
        SharedRegion::open(&name).expect("still openable after opener drop");
    }

    #[test]
    fn destroy_removes_the_name_and_is_idempotent() {
        let name = unique_name("destroy");
        let region = SharedRegion::create(&name).expect("create");

        region.destroy();
        region.destroy();

        // The name is gone from the namespace after clean shutdown.
        assert!(matches!(
            SharedRegion::open(&name),
            Err(SetupError::RegionOpen { .. })
        ));

        // Reads and writes on a destroyed region are inert, not panics.
        region.write_slot(Slot::Tower, 1);
        assert_eq!(region.read_slot(Slot::Tower), 0);
    }

    #[test]
    fn region_name_with_interior_nul_is_rejected() {
        assert!(matches!(
            SharedRegion::create("/bad\0name"),
            Err(SetupError::RegionName { .. })
        ));
    }
}
