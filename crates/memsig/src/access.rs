//! Unchecked typed access to raw addresses
//!
//! These helpers let hook code treat a resolved address as an object field,
//! a virtual method, or a plain function. None of them validate anything:
//! a wrong type, offset, slot or signature is undefined behaviour. Keep their
//! use close to the code that obtained the address.
//!
//! Argument lists are passed as tuples and called through the platform C
//! ABI, which is also the member-function ABI on the supported 64-bit
//! targets:
//!
//! ```ignore
//! let len: usize = unsafe { address_call(strlen_addr, (c"hello".as_ptr(),)) };
//! let id: u32 = unsafe { virtual_call(object, 4, (flags,)) };
//! *unsafe { field::<bool>(object, 0x28) } = true;
//! ```

use std::ffi::c_void;

use crate::resolver::Address;

/// Anything that can be reinterpreted as a raw address
pub trait AsAddress: Copy {
    fn as_address(self) -> usize;
}

impl AsAddress for usize {
    #[inline]
    fn as_address(self) -> usize {
        self
    }
}

impl AsAddress for Address {
    #[inline]
    fn as_address(self) -> usize {
        self.get()
    }
}

impl<T> AsAddress for *const T {
    #[inline]
    fn as_address(self) -> usize {
        self as usize
    }
}

impl<T> AsAddress for *mut T {
    #[inline]
    fn as_address(self) -> usize {
        self as usize
    }
}

/// Mutable reference to a `T` stored `offset` bytes from `base`.
///
/// # Safety
///
/// `base + offset` must point to a live, properly aligned `T` that nothing
/// else accesses for the lifetime `'a`.
#[inline]
pub unsafe fn field<'a, T>(base: impl AsAddress, offset: isize) -> &'a mut T {
    let address = base.as_address().wrapping_add_signed(offset);
    // SAFETY: upheld by the caller.
    unsafe { &mut *(address as *mut T) }
}

/// Shared reference to a `T` stored `offset` bytes from `base`.
///
/// # Safety
///
/// `base + offset` must point to a live, properly aligned `T` that is not
/// mutated for the lifetime `'a`.
#[inline]
pub unsafe fn field_ref<'a, T>(base: impl AsAddress, offset: isize) -> &'a T {
    let address = base.as_address().wrapping_add_signed(offset);
    // SAFETY: upheld by the caller.
    unsafe { &*(address as *const T) }
}

/// Entry `slot` of the virtual table whose pointer is the first word of
/// the object at `this`.
///
/// # Safety
///
/// `this` must point to an object whose first word is a pointer to a table
/// with at least `slot + 1` entries.
#[inline]
pub unsafe fn vtable_entry(this: *const c_void, slot: usize) -> usize {
    // SAFETY: upheld by the caller.
    unsafe {
        let table = *(this as *const *const usize);
        *table.add(slot)
    }
}

/// Call virtual method `slot` on a mutable object, passing `this` first.
///
/// # Safety
///
/// Same requirements as [`vtable_entry`]; the entry must be a function
/// taking `(this, args...)` and returning `R` under the C ABI.
#[inline]
pub unsafe fn virtual_call<R, A: CallArgs>(this: *mut c_void, slot: usize, args: A) -> R {
    // SAFETY: upheld by the caller.
    unsafe {
        let entry = vtable_entry(this, slot);
        args.call_method(entry, this)
    }
}

/// Call virtual method `slot` on a read-only object, passing `this` first.
///
/// # Safety
///
/// See [`virtual_call`].
#[inline]
pub unsafe fn virtual_call_const<R, A: CallArgs>(this: *const c_void, slot: usize, args: A) -> R {
    // SAFETY: upheld by the caller.
    unsafe {
        let entry = vtable_entry(this, slot);
        args.call_method(entry, this)
    }
}

/// Call the function at `address` with `args`.
///
/// # Safety
///
/// `address` must be a function taking `args` and returning `R` under the
/// C ABI.
#[inline]
pub unsafe fn address_call<R, A: CallArgs>(address: impl AsAddress, args: A) -> R {
    // SAFETY: upheld by the caller.
    unsafe { args.call(address.as_address()) }
}

/// Tuple of arguments that can be forwarded to a raw function address
pub trait CallArgs: Sized {
    /// Call `function` with these arguments.
    ///
    /// # Safety
    ///
    /// `function` must have the matching C ABI signature.
    unsafe fn call<R>(self, function: usize) -> R;

    /// Call `function` with `this` followed by these arguments.
    ///
    /// # Safety
    ///
    /// `function` must have the matching C ABI signature.
    unsafe fn call_method<P: Copy, R>(self, function: usize, this: P) -> R;
}

macro_rules! impl_call_args {
    ($($ty:ident $arg:ident),*) => {
        impl<$($ty,)*> CallArgs for ($($ty,)*) {
            #[inline]
            unsafe fn call<R>(self, function: usize) -> R {
                let ($($arg,)*) = self;
                // SAFETY: function pointers and usize share size; the caller
                // vouches for the signature.
                unsafe {
                    let f: unsafe extern "C" fn($($ty),*) -> R = std::mem::transmute_copy(&function);
                    f($($arg),*)
                }
            }

            #[inline]
            unsafe fn call_method<P: Copy, R>(self, function: usize, this: P) -> R {
                let ($($arg,)*) = self;
                // SAFETY: as above.
                unsafe {
                    let f: unsafe extern "C" fn(P, $($ty),*) -> R = std::mem::transmute_copy(&function);
                    f(this, $($arg),*)
                }
            }
        }
    };
}

impl_call_args!();
impl_call_args!(A a);
impl_call_args!(A a, B b);
impl_call_args!(A a, B b, C c);
impl_call_args!(A a, B b, C c, D d);
impl_call_args!(A a, B b, C c, D d, E e);
impl_call_args!(A a, B b, C c, D d, E e, F f);
impl_call_args!(A a, B b, C c, D d, E e, F f, G g);
impl_call_args!(A a, B b, C c, D d, E e, F f, G g, H h);
impl_call_args!(A a, B b, C c, D d, E e, F f, G g, H h, I i);
impl_call_args!(A a, B b, C c, D d, E e, F f, G g, H h, I i, J j);
impl_call_args!(A a, B b, C c, D d, E e, F f, G g, H h, I i, J j, K k);
impl_call_args!(A a, B b, C c, D d, E e, F f, G g, H h, I i, J j, K k, L l);
