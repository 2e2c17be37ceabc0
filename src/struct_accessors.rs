#![macro_use]

use byteorder::LittleEndian;
use four_cc::FourCC;
use zerocopy::{U16, U32, U64};

pub(crate) trait Getter<T> {
    fn get1(self) -> T;
}
impl Getter<u64> for U64<LittleEndian> {
    fn get1(self) -> u64 {
        self.get()
    }
}
impl Getter<u32> for U32<LittleEndian> {
    fn get1(self) -> u32 {
        self.get()
    }
}
impl Getter<u16> for U16<LittleEndian> {
    fn get1(self) -> u16 {
        self.get()
    }
}
impl Getter<u8> for u8 {
    fn get1(self) -> u8 {
        self
    }
}
impl<const N: usize> Getter<[u8; N]> for [u8; N] {
    fn get1(self) -> [u8; N] {
        self
    }
}
impl Getter<FourCC> for [u8; 4] {
    fn get1(self) -> FourCC {
        FourCC(self)
    }
}
pub(crate) trait Setter<T> {
    fn set1(&mut self, value: T);
}
impl Setter<u64> for U64<LittleEndian> {
    fn set1(&mut self, value: u64) {
        self.set(value)
    }
}
impl Setter<u32> for U32<LittleEndian> {
    fn set1(&mut self, value: u32) {
        self.set(value)
    }
}
impl Setter<u16> for U16<LittleEndian> {
    fn set1(&mut self, value: u16) {
        self.set(value)
    }
}
impl Setter<u8> for u8 {
    fn set1(&mut self, value: u8) {
        *self = value
    }
}
impl<const N: usize> Setter<[u8; N]> for [u8; N] {
    fn set1(&mut self, value: [u8; N]) {
        *self = value
    }
}
impl Setter<FourCC> for [u8; 4] {
    fn set1(&mut self, value: FourCC) {
        *self = value.0
    }
}

macro_rules! make_accessors {(
    $(#[$struct_meta:meta])*
    $struct_vis:vis
    struct $StructName:ident {
        $(
            $(#[$field_meta:meta])*
            $field_vis:vis
            $field_name:ident : $field_ty:ty $(: $getter_vis:vis get $field_user_ty:ty $(: $setter_vis:vis set $field_setter_user_ty:ty)?)?
        ),* $(,)?
    }
) => (
    $(#[$struct_meta])*
    $struct_vis
    struct $StructName {
        $(
            $(#[$field_meta])*
            $field_vis
            $field_name: $field_ty,
        )*
    }

    impl $StructName {
        $($(
            #[inline]
            $getter_vis
            fn $field_name (self: &'_ Self)
                -> $field_user_ty
            {
                self.$field_name.get1()
            }
            $(
              paste! {
                  #[inline]
                  $setter_vis
                  fn [<set_ $field_name>] (self: &'_ mut Self, value: $field_setter_user_ty)
                  {
                      self.$field_name.set1(value)
                  }
              }
            )?
        )?)*
    }
)}

pub(crate) use make_accessors;
