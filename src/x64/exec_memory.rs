//! Executable memory for generated code.
//!
//! Pages are mapped read+write, filled, then flipped to read+execute so that
//! no mapping is ever writable and executable at the same time.

use std::io;
use std::ptr::NonNull;

/// A read+execute mapping holding a copy of some machine code.
#[derive(Debug)]
pub struct ExecutableMemory {
    ptr: NonNull<u8>,
    mapped: usize,
    code_len: usize,
}

// The mapping is immutable after construction.
unsafe impl Send for ExecutableMemory {}
unsafe impl Sync for ExecutableMemory {}

fn page_size() -> usize {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as usize
    } else {
        4096
    }
}

impl ExecutableMemory {
    /// Map `code` into fresh executable pages.
    pub fn new(code: &[u8]) -> io::Result<Self> {
        if code.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot map empty code",
            ));
        }
        let page = page_size();
        let mapped = code.len().div_ceil(page) * page;

        let raw = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                mapped,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if raw == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        let Some(ptr) = NonNull::new(raw as *mut u8) else {
            return Err(io::Error::other("mmap returned null"));
        };
        // From here on Drop unmaps.
        let memory = Self {
            ptr,
            mapped,
            code_len: code.len(),
        };

        unsafe {
            std::ptr::copy_nonoverlapping(code.as_ptr(), memory.ptr.as_ptr(), code.len());
            if libc::mprotect(raw, mapped, libc::PROT_READ | libc::PROT_EXEC) != 0 {
                return Err(io::Error::last_os_error());
            }
        }
        log::trace!("mapped {} code bytes into {} executable bytes", code.len(), mapped);
        Ok(memory)
    }

    /// Start of the code.
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    pub fn len(&self) -> usize {
        self.code_len
    }

    pub fn is_empty(&self) -> bool {
        self.code_len == 0
    }

    /// Copy of the mapped code.
    pub fn code(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.code_len) }
    }
}

impl Drop for ExecutableMemory {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.mapped);
        }
    }
}
