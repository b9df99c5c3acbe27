//  Copyright 2021 PolyCrypt GmbH
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
	encoding::{Decode, Encode, Reader},
	error::Result,
	require,
};
use digest::{FixedOutputDirty, Update};
use ed25519_dalek::Sha512 as Hasher;
use serde::de::{Deserializer, Error as _};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;

// Type definitions start here.

#[derive(PartialEq, Debug, Eq, PartialOrd, Ord, Default, Clone)]
/// A hash as used by the signature scheme.
pub struct Hash(pub digest::Output<Hasher>);

/// Unique channel identifier, derived from the channel parameters.
#[derive(PartialEq, Eq, Hash, Ord, PartialOrd, Clone, Copy, Debug)]
pub struct ChannelId(pub [u8; 32]);

/// A channel's unique nonce, to protect against replay attacks.
#[derive(PartialEq, Eq, Hash, Ord, PartialOrd, Clone, Copy, Debug)]
pub struct Nonce(pub [u8; 32]);

/// Identifies the application governing a channel's data. Opaque to the
/// core; payment channels all share a single well-known identifier.
#[derive(PartialEq, Eq, Hash, Ord, PartialOrd, Clone, Copy, Debug)]
pub struct AppId(pub [u8; 32]);

/// Opaque application data carried by a channel state.
#[derive(PartialEq, Eq, Clone, Debug, Default, Serialize, Deserialize)]
pub struct Data(#[serde(with = "serde_bytes")] pub Vec<u8>);

/// A participant's zero-based position in the channel parameters'
/// participant list.
pub type Idx = u16;
/// Channel state version identifier.
pub type Version = u64;
/// Duration in nanoseconds.
pub type Duration = u64;
/// Timestamp in nanoseconds.
pub type Timestamp = u64;

// Hash

impl Serialize for Hash {
	fn serialize<S>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_bytes(&self.0)
	}
}

impl<'de> Deserialize<'de> for Hash {
	fn deserialize<D>(deserializer: D) -> core::result::Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let bytes = ByteBuf::deserialize(deserializer)?;
		require!(
			bytes.len() == <Hasher as digest::Digest>::output_size(),
			D::Error::invalid_length(bytes.len(), &"hash digest")
		);
		Ok(Hash(*digest::Output::<Hasher>::from_slice(
			bytes.as_slice(),
		)))
	}
}

impl std::fmt::Display for Hash {
	/// Formats the first 4 byte of a hash as lower case hex with 0x prefix.
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		let data = &self.0[..4];
		write!(f, "0x{}…", hex::encode(data))
	}
}

impl std::hash::Hash for Hash {
	fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
		self.0.as_slice().hash(state);
	}
}

impl Hash {
	pub fn digest(msg: &[u8]) -> Self {
		let mut h = Hasher::default();
		h.update(msg);
		let mut out: Hash = Hash::default();
		h.finalize_into_dirty(&mut out.0);
		out
	}
}

// ChannelId

impl ChannelId {
	/// Truncates a hash to a channel identifier.
	pub fn from_hash(h: &Hash) -> Self {
		let mut arr = [0u8; 32];
		arr.copy_from_slice(&h.0[..32]);
		ChannelId(arr)
	}
}

impl Default for ChannelId {
	fn default() -> Self {
		ChannelId([0; 32])
	}
}

impl std::fmt::Display for ChannelId {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "0x{}…", hex::encode(&self.0[..4]))
	}
}

impl Serialize for ChannelId {
	fn serialize<S>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_bytes(&self.0)
	}
}

impl<'de> Deserialize<'de> for ChannelId {
	fn deserialize<D>(deserializer: D) -> core::result::Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let bytes = ByteBuf::deserialize(deserializer)?;
		require!(
			bytes.len() == 32,
			D::Error::invalid_length(bytes.len(), &"32-byte ChannelId")
		);
		let mut arr = [0u8; 32];
		arr.copy_from_slice(&bytes[..32]);
		Ok(ChannelId(arr))
	}
}

impl Encode for ChannelId {
	fn encode(&self, w: &mut Vec<u8>) {
		w.extend_from_slice(&self.0);
	}
}

impl Decode for ChannelId {
	fn decode(r: &mut Reader) -> Result<Self> {
		Ok(ChannelId(r.array32()?))
	}
}

// Nonce

impl Nonce {
	/// Derives a nonce from arbitrary seed bytes.
	pub fn from_seed(seed: &[u8]) -> Self {
		let h = Hash::digest(seed);
		let mut arr = [0u8; 32];
		arr.copy_from_slice(&h.0[..32]);
		Nonce(arr)
	}
}

impl Default for Nonce {
	fn default() -> Self {
		Nonce([0; 32])
	}
}

impl Serialize for Nonce {
	fn serialize<S>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_bytes(&self.0)
	}
}

impl<'de> Deserialize<'de> for Nonce {
	fn deserialize<D>(deserializer: D) -> core::result::Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let bytes = ByteBuf::deserialize(deserializer)?;
		require!(
			bytes.len() == 32,
			D::Error::invalid_length(bytes.len(), &"32-byte Nonce")
		);
		let mut arr = [0u8; 32];
		arr.copy_from_slice(&bytes[..32]);
		Ok(Nonce(arr))
	}
}

impl Encode for Nonce {
	fn encode(&self, w: &mut Vec<u8>) {
		w.extend_from_slice(&self.0);
	}
}

impl Decode for Nonce {
	fn decode(r: &mut Reader) -> Result<Self> {
		Ok(Nonce(r.array32()?))
	}
}

// AppId

impl Default for AppId {
	fn default() -> Self {
		AppId([0; 32])
	}
}

impl Serialize for AppId {
	fn serialize<S>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_bytes(&self.0)
	}
}

impl<'de> Deserialize<'de> for AppId {
	fn deserialize<D>(deserializer: D) -> core::result::Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let bytes = ByteBuf::deserialize(deserializer)?;
		require!(
			bytes.len() == 32,
			D::Error::invalid_length(bytes.len(), &"32-byte AppId")
		);
		let mut arr = [0u8; 32];
		arr.copy_from_slice(&bytes[..32]);
		Ok(AppId(arr))
	}
}

impl Encode for AppId {
	fn encode(&self, w: &mut Vec<u8>) {
		w.extend_from_slice(&self.0);
	}
}

impl Decode for AppId {
	fn decode(r: &mut Reader) -> Result<Self> {
		Ok(AppId(r.array32()?))
	}
}

// Data

impl Encode for Data {
	fn encode(&self, w: &mut Vec<u8>) {
		crate::encoding::put_bytes(w, &self.0);
	}
}

impl Decode for Data {
	fn decode(r: &mut Reader) -> Result<Self> {
		Ok(Data(r.bytes()?))
	}
}
