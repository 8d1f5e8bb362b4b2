//! # Internal Macros
//!
//! ## zerocopy_accessors!
//!
//! Generates getter and setter methods for zerocopy struct fields stored in
//! byte-order wrapper types. Record payloads use the little-endian wrappers
//! (`U16`, `I16`, `U32`, `I32`, `U64`, `I64`, `F32`, `F64`) so that files
//! written on one machine read back identically on another. Single bytes
//! (`u8`, `i8`) are stored as plain fields. Record headers use the native
//! `overlay::HeaderWord`.
//!
//! ### Usage
//!
//! ```ignore
//! use zerocopy::little_endian::{F64, U32, U64};
//!
//! #[repr(C)]
//! #[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
//! struct Trade {
//!     id: U32,
//!     price: F64,
//!     quantity: U64,
//! }
//!
//! impl Trade {
//!     zerocopy_accessors! {
//!         id: u32,
//!         price: f64,
//!         quantity: u64,
//!     }
//! }
//!
//! // Generates:
//! // pub fn id(&self) -> u32 { self.id.get() }
//! // pub fn set_id(&mut self, val: u32) { self.id = U32::new(val); }
//! // ...
//! ```
//!
//! ## impl_primitive_record!
//!
//! Implements `overlay::Record` for fixed-size primitives, which are the only
//! types accepted as array elements.

/// Generates getter and setter methods for zerocopy byte-order fields.
#[macro_export]
macro_rules! zerocopy_accessors {
    (@wrap u16) => { ::zerocopy::little_endian::U16 };
    (@wrap i16) => { ::zerocopy::little_endian::I16 };
    (@wrap u32) => { ::zerocopy::little_endian::U32 };
    (@wrap i32) => { ::zerocopy::little_endian::I32 };
    (@wrap u64) => { ::zerocopy::little_endian::U64 };
    (@wrap i64) => { ::zerocopy::little_endian::I64 };
    (@wrap f32) => { ::zerocopy::little_endian::F32 };
    (@wrap f64) => { ::zerocopy::little_endian::F64 };
    (@wrap usize) => { $crate::overlay::HeaderWord };
    (@impl $field:ident, u8) => { $crate::zerocopy_accessors!(@plain $field, u8); };
    (@impl $field:ident, i8) => { $crate::zerocopy_accessors!(@plain $field, i8); };
    (@plain $field:ident, $ty:tt) => {
        ::paste::paste! {
            #[inline]
            pub fn $field(&self) -> $ty {
                self.$field
            }

            #[inline]
            pub fn [<set_ $field>](&mut self, val: $ty) {
                self.$field = val;
            }
        }
    };
    (@impl $field:ident, $ty:tt) => {
        ::paste::paste! {
            #[inline]
            pub fn $field(&self) -> $ty {
                self.$field.get()
            }

            #[inline]
            pub fn [<set_ $field>](&mut self, val: $ty) {
                self.$field = <$crate::zerocopy_accessors!(@wrap $ty)>::new(val);
            }
        }
    };
    ($($field:ident : $ty:tt),* $(,)?) => {
        $(
            $crate::zerocopy_accessors!(@impl $field, $ty);
        )*
    };
}

/// Implements `Record` for primitive element types.
macro_rules! impl_primitive_record {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $crate::overlay::Record for $ty {
                const NAME: &'static str = stringify!($ty);
                const PRIMITIVE: bool = true;
            }
        )*
    };
}
