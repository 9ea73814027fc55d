use std::fmt;
use std::num::NonZeroUsize;

use serde::Serialize;
use strum::{Display, EnumString, IntoStaticStr};

/// A resolved runtime address. Zero means "not found".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Address(usize);

impl Address {
    pub const NULL: Self = Self(0);

    #[inline]
    pub const fn new(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub const fn get(self) -> usize {
        self.0
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// `None` for the not-found sentinel
    #[inline]
    pub fn non_null(self) -> Option<NonZeroUsize> {
        NonZeroUsize::new(self.0)
    }

    #[inline]
    pub fn as_ptr<T>(self) -> *const T {
        self.0 as *const T
    }

    #[inline]
    pub fn as_mut_ptr<T>(self) -> *mut T {
        self.0 as *mut T
    }

    /// Distance from `base`, or `None` if this address lies below it
    #[inline]
    pub fn offset_from(self, base: usize) -> Option<usize> {
        self.0.checked_sub(base)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X}", self.0)
    }
}

impl From<usize> for Address {
    fn from(value: usize) -> Self {
        Self(value)
    }
}

impl From<Address> for usize {
    fn from(address: Address) -> Self {
        address.0
    }
}

/// Which resolution step produced an address
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Answered from the address cache
    Cache,
    /// Exported symbol of the module
    Symbol,
    /// Empty pattern, resolved to the module base
    ModuleBase,
    /// Found by scanning the module image
    Scan,
    /// Scan finished without a match
    NotFound,
}

/// Address plus the step that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub address: Address,
    pub source: Source,
}

impl Resolution {
    pub fn is_found(&self) -> bool {
        !self.address.is_null()
    }
}
