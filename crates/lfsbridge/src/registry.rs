//! Device tokens handed to native code.
//!
//! The engine passes an opaque `void *context` back on every callback.
//! [`DeviceToken::register`] moves a device to a fixed heap address and
//! hands out that address as the context; [`DeviceToken::release`] takes the
//! device back. The address stays valid for exactly the lifetime of the
//! token, and releasing consumes the token, so it cannot happen twice.
//!
//! The owning [`Filesystem`](crate::Filesystem) must not release its token
//! while the engine can still call back, i.e. before unmount.

use std::ffi::c_void;
use std::fmt;
use std::marker::PhantomData;
use std::mem::ManuallyDrop;
use std::ptr::NonNull;

/// Registration of one device with native code.
pub struct DeviceToken<D> {
    ptr: NonNull<D>,
    _owns: PhantomData<D>,
}

impl<D> DeviceToken<D> {
    /// Pin `device` and issue a token for it.
    pub fn register(device: D) -> Self {
        let ptr = NonNull::from(Box::leak(Box::new(device)));
        tracing::trace!(context = ?ptr, "registered device");
        Self {
            ptr,
            _owns: PhantomData,
        }
    }

    /// The value to store in the native context slot.
    pub fn context(&self) -> *mut c_void {
        self.ptr.as_ptr().cast()
    }

    /// Map a native context back to its device.
    ///
    /// Returns `None` for a null context.
    ///
    /// # Safety
    ///
    /// `context` must be null or come from [`context`](Self::context) on a
    /// token of the same `D` that is still registered, and no other
    /// reference to the device may be live for `'a`.
    pub unsafe fn resolve<'a>(context: *mut c_void) -> Option<&'a mut D> {
        // SAFETY: the caller guarantees the pointer came from a live token.
        NonNull::new(context.cast::<D>()).map(|mut ptr| unsafe { ptr.as_mut() })
    }

    /// Borrow the device while no native call is in flight.
    pub fn get_mut(&mut self) -> &mut D {
        // SAFETY: the allocation lives as long as the token, and `&mut self`
        // proves nobody else is using the context right now.
        unsafe { self.ptr.as_mut() }
    }

    /// Retire the token and take the device back.
    pub fn release(self) -> D {
        let this = ManuallyDrop::new(self);
        tracing::trace!(context = ?this.ptr, "released device");
        // SAFETY: the pointer came from `Box::leak` in `register` and is
        // reclaimed exactly once, here or in `Drop`.
        *unsafe { Box::from_raw(this.ptr.as_ptr()) }
    }
}

impl<D> Drop for DeviceToken<D> {
    fn drop(&mut self) {
        tracing::trace!(context = ?self.ptr, "dropped device token");
        // SAFETY: see `release`; `release` skips this via ManuallyDrop.
        drop(unsafe { Box::from_raw(self.ptr.as_ptr()) });
    }
}

impl<D> fmt::Debug for DeviceToken<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceToken")
            .field("context", &self.ptr)
            .finish()
    }
}

// SAFETY: the token owns its device like a Box does.
unsafe impl<D: Send> Send for DeviceToken<D> {}
