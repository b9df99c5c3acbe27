//  Copyright 2022 PolyCrypt GmbH
//
//  Licensed under the Apache License, Version 2.0 (the "License");
//  you may not use this file except in compliance with the License.
//  You may obtain a copy of the License at
//
//    http://www.apache.org/licenses/LICENSE-2.0
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.

use crate::{
	error::{Error, Result},
	require,
};

/// Canonical binary encoding. All integers are big-endian; variable-length
/// byte strings are u32-length-prefixed. Two agents encoding the same value
/// must produce the same bytes, as the encoding feeds the channel-id hash
/// and all protocol signatures.
pub trait Encode {
	fn encode(&self, w: &mut Vec<u8>);

	/// Encodes the value into a fresh buffer.
	fn encoded(&self) -> Vec<u8> {
		let mut w = Vec::new();
		self.encode(&mut w);
		w
	}
}

/// Decoding counterpart of [`Encode`]. Must accept exactly the bytes that
/// `encode` produces.
pub trait Decode: Sized {
	fn decode(r: &mut Reader) -> Result<Self>;

	/// Decodes a value from a full buffer. Trailing bytes are an error, as
	/// the encoding is canonical.
	fn decoded(bytes: &[u8]) -> Result<Self> {
		let mut r = Reader::new(bytes);
		let v = Self::decode(&mut r)?;
		require!(r.is_empty(), InvalidInput);
		Ok(v)
	}
}

/// A bounds-checked cursor over an encoded buffer.
pub struct Reader<'a> {
	buf: &'a [u8],
}

impl<'a> Reader<'a> {
	pub fn new(buf: &'a [u8]) -> Self {
		Self { buf }
	}

	pub fn is_empty(&self) -> bool {
		self.buf.is_empty()
	}

	/// Takes the next `n` raw bytes off the buffer.
	pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
		require!(self.buf.len() >= n, InvalidInput);
		let (head, tail) = self.buf.split_at(n);
		self.buf = tail;
		Ok(head)
	}

	pub fn u8(&mut self) -> Result<u8> {
		Ok(self.take(1)?[0])
	}

	pub fn u16(&mut self) -> Result<u16> {
		let b = self.take(2)?;
		Ok(u16::from_be_bytes([b[0], b[1]]))
	}

	pub fn u32(&mut self) -> Result<u32> {
		let b = self.take(4)?;
		Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
	}

	pub fn u64(&mut self) -> Result<u64> {
		let b = self.take(8)?;
		let mut a = [0u8; 8];
		a.copy_from_slice(b);
		Ok(u64::from_be_bytes(a))
	}

	/// Reads a u32-length-prefixed byte string.
	pub fn bytes(&mut self) -> Result<Vec<u8>> {
		let n = self.u32()? as usize;
		Ok(self.take(n)?.to_vec())
	}

	/// Reads exactly 32 raw bytes into an array.
	pub fn array32(&mut self) -> Result<[u8; 32]> {
		let mut a = [0u8; 32];
		a.copy_from_slice(self.take(32)?);
		Ok(a)
	}
}

pub fn put_u8(w: &mut Vec<u8>, v: u8) {
	w.push(v);
}

pub fn put_u16(w: &mut Vec<u8>, v: u16) {
	w.extend_from_slice(&v.to_be_bytes());
}

pub fn put_u32(w: &mut Vec<u8>, v: u32) {
	w.extend_from_slice(&v.to_be_bytes());
}

pub fn put_u64(w: &mut Vec<u8>, v: u64) {
	w.extend_from_slice(&v.to_be_bytes());
}

/// Writes a u32-length-prefixed byte string.
pub fn put_bytes(w: &mut Vec<u8>, bytes: &[u8]) {
	put_u32(w, bytes.len() as u32);
	w.extend_from_slice(bytes);
}
