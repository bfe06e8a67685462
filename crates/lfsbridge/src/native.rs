//! Native allocations and path conversion.

use std::ffi::CString;
use std::ptr::NonNull;

use crate::error::{Error, Result};

/// Longest file name the engine accepts, in bytes.
pub const NAME_MAX: usize = 255;

/// Heap allocation at a fixed address shared with native code.
///
/// The engine keeps raw pointers to its state, configuration and open
/// files between calls, so these live behind a raw pointer rather than a
/// `Box` that Rust would consider uniquely borrowed. Freed on drop.
pub(crate) struct NativeBox<T> {
    ptr: NonNull<T>,
}

impl<T> NativeBox<T> {
    pub fn new(value: T) -> Self {
        Self {
            ptr: NonNull::from(Box::leak(Box::new(value))),
        }
    }

    /// Allocate an all-zero `T`.
    ///
    /// # Safety
    ///
    /// All-zero bytes must be a valid `T`; true for the engine's plain C
    /// structs.
    pub unsafe fn zeroed() -> Self {
        // SAFETY: upheld by the caller.
        Self::new(unsafe { std::mem::zeroed() })
    }

    pub fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// Borrow the value while native code is not using it.
    pub fn get_mut(&mut self) -> &mut T {
        // SAFETY: owned allocation; `&mut self` excludes other Rust access.
        unsafe { self.ptr.as_mut() }
    }
}

impl<T> Drop for NativeBox<T> {
    fn drop(&mut self) {
        // SAFETY: allocated by `Box::leak` in `new`, freed only here.
        drop(unsafe { Box::from_raw(self.ptr.as_ptr()) });
    }
}

// SAFETY: ownership is exclusive, like Box.
unsafe impl<T: Send> Send for NativeBox<T> {}

/// Convert a path for the engine.
///
/// Interior NUL bytes cannot cross the boundary; an over-long final
/// component is refused before the engine sees it.
pub(crate) fn c_path(path: &str) -> Result<CString> {
    let name = path.rsplit('/').next().unwrap_or(path);
    if name.len() > NAME_MAX {
        return Err(Error::NameTooLong);
    }
    CString::new(path).map_err(|_| Error::InvalidParam)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_c_path() {
        assert_eq!(c_path("/tmp/test.txt").unwrap().as_bytes(), b"/tmp/test.txt");
        assert_eq!(c_path("bad\0path"), Err(Error::InvalidParam));

        let long = format!("/dir/{}", "x".repeat(NAME_MAX + 1));
        assert_eq!(c_path(&long), Err(Error::NameTooLong));
        let ok = format!("/{}/short", "x".repeat(NAME_MAX + 1));
        assert!(c_path(&ok).is_ok());
    }

    #[test]
    fn test_native_box_zeroed() {
        let mut value = unsafe { NativeBox::<[u32; 4]>::zeroed() };
        assert_eq!(value.get_mut(), &[0; 4]);
        value.get_mut()[1] = 9;
        assert_eq!(unsafe { *value.as_ptr() }[1], 9);
    }
}
