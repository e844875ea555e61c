//! One-way shared memory hand-off to an external visualizer.
//!
//! Regions are POSIX shared memory objects mapped `MAP_SHARED`. There is a
//! single writer and no synchronization: a reader may see a frame that is
//! only partly updated.

use std::ffi::CString;
use std::io;
use std::ptr::NonNull;
use tracing::{debug, info};

use crate::audio::{BandFrame, BAND_COUNT};
use crate::error::ResourceError;

/// Destination for each cycle's output.
pub trait Publish {
    fn publish(&mut self, frame: &BandFrame);

    /// Slots for raw channel 0 samples, when the raw dump is enabled.
    fn raw_samples(&mut self) -> Option<&mut [i32]>;
}

/// Normalize a region name into the `/name` form `shm_open` expects.
pub fn shm_name(name: &str) -> String {
    if name.starts_with('/') {
        name.to_string()
    } else {
        format!("/{}", name)
    }
}

fn page_size() -> usize {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as usize
    } else {
        4096
    }
}

/// A created, truncated and mapped shared memory object.
pub struct SharedRegion {
    ptr: NonNull<u8>,
    len: usize,
    name: String,
}

impl SharedRegion {
    /// Create (or reuse) the object `name`, size it to `len` bytes and map it.
    pub fn create(name: &str, len: usize) -> Result<Self, ResourceError> {
        let name = shm_name(name);
        let fail = |source: io::Error| ResourceError::SharedMemory {
            name: name.clone(),
            source,
        };
        let c_name = CString::new(name.as_str())
            .map_err(|e| fail(io::Error::new(io::ErrorKind::InvalidInput, e)))?;

        let fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDWR | libc::O_CREAT, 0o666) };
        if fd < 0 {
            return Err(fail(io::Error::last_os_error()));
        }

        let result = unsafe {
            if libc::ftruncate(fd, len as libc::off_t) < 0 {
                Err(io::Error::last_os_error())
            } else {
                let map = libc::mmap(
                    std::ptr::null_mut(),
                    len,
                    libc::PROT_READ | libc::PROT_WRITE,
                    libc::MAP_SHARED,
                    fd,
                    0,
                );
                if map == libc::MAP_FAILED {
                    Err(io::Error::last_os_error())
                } else {
                    Ok(map)
                }
            }
        };
        // The mapping keeps the object alive; the descriptor is no longer needed
        unsafe { libc::close(fd) };

        let map = result.map_err(fail)?;
        let ptr = NonNull::new(map as *mut u8)
            .ok_or_else(|| fail(io::Error::new(io::ErrorKind::Other, "mmap returned null")))?;

        debug!("Mapped shared memory {} ({} bytes)", name, len);
        Ok(Self { ptr, len, name })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.len);
        }
    }
}

/// Publishes band frames (and optionally raw samples) to shared memory.
pub struct ShmPublisher {
    bands: SharedRegion,
    raw: Option<SharedRegion>,
}

impl ShmPublisher {
    /// Map the band region, one page holding `BAND_COUNT` floats, and the raw
    /// dump region of `period_frames` i32 slots when `raw_dump` is set.
    pub fn create(
        band_region: &str,
        raw_dump: Option<&str>,
        period_frames: usize,
    ) -> Result<Self, ResourceError> {
        let footprint = BAND_COUNT * std::mem::size_of::<f32>();
        let page = page_size();
        let band_len = footprint.div_ceil(page) * page;
        let bands = SharedRegion::create(band_region, band_len)?;
        info!("Publishing {} band magnitudes to {}", BAND_COUNT, bands.name());

        let raw = match raw_dump {
            Some(name) => {
                let region =
                    SharedRegion::create(name, period_frames * std::mem::size_of::<i32>())?;
                info!("Dumping raw channel 0 samples to {}", region.name());
                Some(region)
            }
            None => None,
        };

        Ok(Self { bands, raw })
    }
}

impl Publish for ShmPublisher {
    fn publish(&mut self, frame: &BandFrame) {
        let bytes: &[u8] = bytemuck::cast_slice(frame.as_slice());
        self.bands.as_mut_slice()[..bytes.len()].copy_from_slice(bytes);
    }

    fn raw_samples(&mut self) -> Option<&mut [i32]> {
        self.raw
            .as_mut()
            .map(|region| bytemuck::cast_slice_mut(region.as_mut_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique(tag: &str) -> String {
        format!("bandscope-test-{}-{}", std::process::id(), tag)
    }

    fn read_back(name: &str) -> Vec<u8> {
        std::fs::read(format!("/dev/shm{}", shm_name(name))).unwrap()
    }

    fn unlink(name: &str) {
        let c_name = CString::new(shm_name(name)).unwrap();
        unsafe { libc::shm_unlink(c_name.as_ptr()) };
    }

    #[test]
    fn names_gain_a_leading_slash() {
        assert_eq!(shm_name("fband"), "/fband");
        assert_eq!(shm_name("/fband"), "/fband");
    }

    #[test]
    fn band_frame_lands_at_offset_zero_of_a_page() {
        let name = unique("bands");
        let mut publisher = ShmPublisher::create(&name, None, 1024).unwrap();
        assert!(publisher.raw_samples().is_none());

        let mut values = [0.0f32; BAND_COUNT];
        for (i, v) in values.iter_mut().enumerate() {
            *v = i as f32 * 10.5;
        }
        publisher.publish(&BandFrame(values));

        let bytes = read_back(&name);
        assert_eq!(bytes.len() % page_size(), 0);
        let published: Vec<f32> = bytes[..BAND_COUNT * 4]
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(published, values.to_vec());

        drop(publisher);
        unlink(&name);
    }

    #[test]
    fn raw_dump_region_holds_one_period_of_i32() {
        let bands = unique("raw-bands");
        let raw = unique("raw");
        let mut publisher = ShmPublisher::create(&bands, Some(&raw), 8).unwrap();

        let slots = publisher.raw_samples().expect("raw dump enabled");
        assert_eq!(slots.len(), 8);
        slots.copy_from_slice(&[-3, -2, -1, 0, 1, 2, 3, i32::MIN]);

        let bytes = read_back(&raw);
        assert_eq!(bytes.len(), 32);
        assert_eq!(&bytes[28..], &i32::MIN.to_ne_bytes());
        assert_eq!(&bytes[..4], &(-3i32).to_ne_bytes());

        drop(publisher);
        unlink(&bands);
        unlink(&raw);
    }

    #[test]
    fn invalid_name_is_a_resource_error() {
        let err = SharedRegion::create("bad\0name", 16).err().expect("must fail");
        assert!(matches!(err, ResourceError::SharedMemory { .. }));
    }
}
