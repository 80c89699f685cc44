//! Executable-region management.
//!
//! The emitted code is copied into page-aligned anonymous memory mapped
//! read-write, then remapped read-execute. The region is deliberately
//! never unmapped: goroutine tasks may call into it after the entry-point
//! call returns.

use crate::error::CompileError;

/// An installed, executable code region.
pub struct ExecutableRegion {
    base: *mut u8,
    size: usize,
}

// Safety: after install the region is immutable (R-X) for the process
// lifetime, so sharing the base pointer across threads is sound.
unsafe impl Send for ExecutableRegion {}
unsafe impl Sync for ExecutableRegion {}

impl ExecutableRegion {
    /// Map, copy, and seal the code. Mapping failures are reported and the
    /// unit is not executed.
    #[cfg(unix)]
    pub fn install(code: &[u8]) -> Result<Self, CompileError> {
        if code.is_empty() {
            return Err(CompileError::Jit("no machine code to install".to_string()));
        }

        // Safety: mmap/mprotect with checked results; the copy stays in
        // bounds of the fresh mapping.
        unsafe {
            let page_size = libc::sysconf(libc::_SC_PAGESIZE) as usize;
            let size = (code.len() + page_size - 1) & !(page_size - 1);

            let base = libc::mmap(
                std::ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED | libc::MAP_ANONYMOUS,
                -1,
                0,
            );
            if base == libc::MAP_FAILED {
                return Err(CompileError::Jit(
                    "mmap failed for executable region".to_string(),
                ));
            }
            let base = base as *mut u8;
            std::ptr::copy_nonoverlapping(code.as_ptr(), base, code.len());

            if libc::mprotect(base as *mut libc::c_void, size, libc::PROT_READ | libc::PROT_EXEC)
                != 0
            {
                libc::munmap(base as *mut libc::c_void, size);
                return Err(CompileError::Jit(
                    "mprotect failed to seal executable region".to_string(),
                ));
            }

            Ok(Self { base, size })
        }
    }

    #[cfg(not(unix))]
    pub fn install(_code: &[u8]) -> Result<Self, CompileError> {
        Err(CompileError::Jit(
            "executable regions require a unix target".to_string(),
        ))
    }

    pub fn base(&self) -> usize {
        self.base as usize
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Entry point at `offset`, as a zero-argument native function.
    ///
    /// # Safety
    /// `offset` must be the start of a complete emitted function within
    /// the sealed region.
    pub unsafe fn entry(&self, offset: usize) -> extern "C" fn() -> i64 {
        std::mem::transmute(self.base.add(offset))
    }
}

// No Drop: the mapping outlives the entry-point call on purpose.

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_install_rejects_empty_code() {
        assert!(ExecutableRegion::install(&[]).is_err());
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn test_install_and_execute_return_42() {
        // mov rax, 42 ; ret
        let code = [0x48, 0xC7, 0xC0, 0x2A, 0x00, 0x00, 0x00, 0xC3];
        let region = ExecutableRegion::install(&code).unwrap();
        assert!(region.base() != 0);
        assert!(region.size() >= code.len());
        let entry = unsafe { region.entry(0) };
        assert_eq!(entry(), 42);
    }
}
