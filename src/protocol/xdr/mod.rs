//! External Data Representation (XDR) codec.
//!
//! XDR is the deterministic binary layout used by ONC RPC and NFS to move
//! structured data between machines of different architectures
//! (<https://datatracker.ietf.org/doc/html/rfc1832>).
//!
//! The codec is pure and stateless: values serialize into any
//! [`std::io::Write`] and deserialize from any [`std::io::Read`], with the
//! caller owning cursor position. Where the XDR language names a type the
//! natural Rust equivalent is used instead: `unsigned int` is `u32`,
//! `opaque<>` is `Vec<u8>`, optional data is `Option<T>`. All layout
//! guarantees of the original types are kept: big-endian integers, four-byte
//! alignment with zero padding, length-prefixed variable data.
//!
//! Decoding never truncates or wraps silently. Insufficient input, a length
//! prefix above a field's maximum, a union discriminant without a registered
//! arm, or a non-ASCII string each fail with `InvalidData`/`UnexpectedEof`.

use std::io::{Read, Write};

use byteorder::BigEndian;
use byteorder::{ReadBytesExt, WriteBytesExt};
use num_traits::{FromPrimitive, ToPrimitive};

pub mod mount;
pub mod nfs3;
pub mod rpc;
mod utils;

/// XDR mandates big endian encoding.
pub type XdrEndian = BigEndian;

pub trait Serialize {
    /// Writes the XDR encoding of `self` to `dest`.
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()>;
}

pub trait Deserialize {
    /// Replaces `self` with a value decoded from `src`.
    ///
    /// On error the value must not be observed; helpers like [`deserialize`]
    /// discard it.
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()>;
}

/// Decodes a `T` from `src`, starting from `T::default()`.
pub fn deserialize<T>(src: &mut impl Read) -> std::io::Result<T>
where
    T: Deserialize + Default,
{
    let mut val = T::default();
    val.deserialize(src)?;
    Ok(val)
}

/// Marker trait: XDR `enum` values serialize as their signed 32-bit code.
pub trait SerializeEnum: ToPrimitive {}

impl<T: SerializeEnum> Serialize for T {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self.to_i32() {
            Some(val) => dest.write_i32::<XdrEndian>(val),
            None => Err(utils::invalid_data("enum value out of range")),
        }
    }
}

/// Marker trait: XDR `enum` decoding rejects codes with no registered member.
pub trait DeserializeEnum: FromPrimitive {}

impl<T: DeserializeEnum> Deserialize for T {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        let code = src.read_i32::<XdrEndian>()?;
        match FromPrimitive::from_i32(code) {
            Some(val) => {
                *self = val;
                Ok(())
            }
            None => Err(utils::invalid_data(format!("unknown enum code {code}"))),
        }
    }
}

/// XDR `bool` is the enum `{ FALSE = 0, TRUE = 1 }`; any other code is an
/// error, not a truthy value.
impl Serialize for bool {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        dest.write_i32::<XdrEndian>(if *self { 1 } else { 0 })
    }
}

impl Deserialize for bool {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        match src.read_i32::<XdrEndian>()? {
            0 => *self = false,
            1 => *self = true,
            code => return Err(utils::invalid_data(format!("invalid bool code {code}"))),
        }
        Ok(())
    }
}

/// XDR `int`.
impl Serialize for i32 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        dest.write_i32::<XdrEndian>(*self)
    }
}

impl Deserialize for i32 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = src.read_i32::<XdrEndian>()?;
        Ok(())
    }
}

/// XDR `hyper`.
impl Serialize for i64 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        dest.write_i64::<XdrEndian>(*self)
    }
}

impl Deserialize for i64 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = src.read_i64::<XdrEndian>()?;
        Ok(())
    }
}

/// XDR `unsigned int`.
impl Serialize for u32 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        dest.write_u32::<XdrEndian>(*self)
    }
}

impl Deserialize for u32 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = src.read_u32::<XdrEndian>()?;
        Ok(())
    }
}

/// XDR `unsigned hyper`.
impl Serialize for u64 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        dest.write_u64::<XdrEndian>(*self)
    }
}

impl Deserialize for u64 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = src.read_u64::<XdrEndian>()?;
        Ok(())
    }
}

/// Lengths on the wire are always `u32`; this wrapper converts to and from
/// the `usize` Rust collections use, failing rather than wrapping.
#[derive(Default)]
struct UsizeAsU32(usize);

impl Serialize for UsizeAsU32 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        let Some(val) = self.0.to_u32() else {
            return Err(utils::invalid_data("length does not fit in u32"));
        };
        val.serialize(dest)
    }
}

impl Deserialize for UsizeAsU32 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        let Some(val) = deserialize::<u32>(src)?.to_usize() else {
            return Err(utils::invalid_data("length does not fit in usize"));
        };
        self.0 = val;
        Ok(())
    }
}

/// Fixed-length opaque data: `opaque identifier[n]`.
impl<const N: usize> Serialize for [u8; N] {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        dest.write_all(self)?;
        utils::write_padding(N, dest)
    }
}

impl<const N: usize> Deserialize for [u8; N] {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        src.read_exact(self)?;
        utils::read_padding(N, src)
    }
}

/// Variable-length opaque data: `opaque identifier<>`.
impl Serialize for [u8] {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        UsizeAsU32(self.len()).serialize(dest)?;
        dest.write_all(self)?;
        utils::write_padding(self.len(), dest)
    }
}

impl Deserialize for Vec<u8> {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        let length = deserialize::<UsizeAsU32>(src)?.0;
        // The declared length is untrusted until the bytes actually arrive.
        // Growing the buffer as data is read means a lying prefix fails at
        // end of input instead of committing the full allocation up front.
        self.clear();
        let copied = (&mut *src).take(length as u64).read_to_end(self)?;
        if copied != length {
            return Err(utils::invalid_data(format!(
                "declared length {length} but stream ended after {copied} bytes"
            )));
        }
        utils::read_padding(length, src)
    }
}

/// Decodes variable-length opaque data whose declared length must not exceed
/// `max`. Protocol fields with a mandated maximum (file handles, filenames,
/// paths) decode through this instead of the unbounded `Vec<u8>` impl.
pub fn deserialize_bounded_opaque(src: &mut impl Read, max: usize) -> std::io::Result<Vec<u8>> {
    let length = deserialize::<UsizeAsU32>(src)?.0;
    if length > max {
        return Err(utils::invalid_data(format!(
            "declared length {length} exceeds field maximum {max}"
        )));
    }
    let mut data = vec![0; length];
    src.read_exact(&mut data)?;
    utils::read_padding(length, src)?;
    Ok(data)
}

/// XDR strings are variable-length opaque data restricted to ASCII.
impl Serialize for str {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        self.as_bytes().serialize(dest)
    }
}

impl Deserialize for String {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        // SAFETY: the buffer is cleared on every exit path that leaves it
        // holding unverified bytes.
        unsafe {
            if let err @ Err(_) = self.as_mut_vec().deserialize(src) {
                self.clear();
                return err;
            }
            if !self.as_mut_vec().is_ascii() {
                self.clear();
                return Err(utils::invalid_data("string is not ASCII"));
            }
        }
        Ok(())
    }
}

/// Fixed-length arrays encode each element in order with no length prefix.
impl<const N: usize, T: Serialize> Serialize for [T; N] {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        for item in self {
            item.serialize(dest)?;
        }
        Ok(())
    }
}

impl<const N: usize, T: Deserialize> Deserialize for [T; N] {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        for item in self {
            item.deserialize(src)?;
        }
        Ok(())
    }
}

/// Variable-length arrays: a `u32` element count, then each element.
impl<T: Serialize> Serialize for [T] {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        UsizeAsU32(self.len()).serialize(dest)?;
        for item in self {
            item.serialize(dest)?;
        }
        Ok(())
    }
}

impl<T: Deserialize + Default> Deserialize for Vec<T> {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        let length = deserialize::<UsizeAsU32>(src)?.0;
        // Element counts are untrusted too: decode one element at a time so
        // a lying count runs out of input instead of sizing the buffer.
        self.clear();
        for _ in 0..length {
            self.push(deserialize::<T>(src)?);
        }
        Ok(())
    }
}

/// XDR optional data is a bool discriminant followed by the value when true.
impl<T: Serialize> Serialize for Option<T> {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            Some(data) => {
                true.serialize(dest)?;
                data.serialize(dest)
            }
            None => false.serialize(dest),
        }
    }
}

impl<T: Deserialize + Default> Deserialize for Option<T> {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = if deserialize::<bool>(src)? { Some(deserialize::<T>(src)?) } else { None };
        Ok(())
    }
}

/// Implements [`Serialize`] for a struct by encoding each named field in
/// declaration order.
#[allow(non_camel_case_types)]
#[macro_export]
macro_rules! SerializeStruct {
    ($t:ident, $($field:ident),*) => {
        impl Serialize for $t {
            fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
                $(self.$field.serialize(dest)?;)*
                Ok(())
            }
        }
    };
}

/// Implements [`Deserialize`] for a struct by decoding each named field in
/// declaration order.
#[allow(non_camel_case_types)]
#[macro_export]
macro_rules! DeserializeStruct {
    ($t:ident, $($field:ident),*) => {
        impl Deserialize for $t {
            fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
                $(self.$field.deserialize(src)?;)*
                Ok(())
            }
        }
    };
}

/// Implements [`Serialize`] for a two-armed union discriminated by an XDR
/// bool: `Void` encodes FALSE, the payload arm encodes TRUE then the value.
#[allow(non_camel_case_types)]
#[macro_export]
macro_rules! SerializeBoolUnion {
    ($t:ident, $arm:ident) => {
        impl Serialize for $t {
            fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
                match self {
                    $t::Void => false.serialize(dest),
                    $t::$arm(v) => {
                        true.serialize(dest)?;
                        v.serialize(dest)
                    }
                }
            }
        }
    };
}

/// [`Deserialize`] counterpart of [`SerializeBoolUnion`]. The bool decode
/// itself rejects discriminants other than 0 and 1.
#[allow(non_camel_case_types)]
#[macro_export]
macro_rules! DeserializeBoolUnion {
    ($t:ident, $arm:ident) => {
        impl Deserialize for $t {
            fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
                *self = if deserialize::<bool>(src)? {
                    $t::$arm(deserialize(src)?)
                } else {
                    $t::Void
                };
                Ok(())
            }
        }
    };
}

pub use crate::DeserializeBoolUnion;
pub use crate::DeserializeStruct;
pub use crate::SerializeBoolUnion;
pub use crate::SerializeStruct;
