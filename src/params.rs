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
	encoding::{put_u32, put_u64, Decode, Encode, Reader},
	error::Result,
	types::{AppId, ChannelId, Duration, Hash, Idx, Nonce},
	wallet::Address,
};
use serde::{Deserialize, Serialize};

/// The immutable parameters of a channel. The channel identifier is the
/// hash of their canonical encoding, so any two agents starting from equal
/// parameters agree on the identifier bit for bit.
#[derive(PartialEq, Eq, Clone, Debug, Serialize, Deserialize)]
pub struct Params {
	/// When a dispute occurs, how long to wait for responses.
	pub challenge_duration: Duration,
	/// The channel's participants' identities, in channel order.
	pub parts: Vec<Address>,
	/// The application governing the channel's data.
	pub app_def: AppId,
	/// The channel's unique nonce, to protect against replay attacks.
	pub nonce: Nonce,
}

impl Params {
	pub fn new(
		challenge_duration: Duration,
		parts: Vec<Address>,
		app_def: AppId,
		nonce: Nonce,
	) -> Self {
		Self {
			challenge_duration,
			parts,
			app_def,
			nonce,
		}
	}

	/// Derives the channel identifier from the canonical parameter
	/// encoding.
	pub fn id(&self) -> ChannelId {
		ChannelId::from_hash(&Hash::digest(&self.encoded()))
	}

	pub fn num_parts(&self) -> usize {
		self.parts.len()
	}

	/// Looks up a participant's channel index by address.
	pub fn index_of(&self, addr: &Address) -> Option<Idx> {
		self.parts.iter().position(|p| p == addr).map(|i| i as Idx)
	}
}

impl Encode for Params {
	fn encode(&self, w: &mut Vec<u8>) {
		put_u64(w, self.challenge_duration);
		put_u32(w, self.parts.len() as u32);
		for p in &self.parts {
			p.encode(w);
		}
		self.app_def.encode(w);
		self.nonce.encode(w);
	}
}

impl Decode for Params {
	fn decode(r: &mut Reader) -> Result<Self> {
		let challenge_duration = r.u64()?;
		let n = r.u32()? as usize;
		let mut parts = Vec::with_capacity(n);
		for _ in 0..n {
			parts.push(Address::decode(r)?);
		}
		let app_def = AppId::decode(r)?;
		let nonce = Nonce::decode(r)?;
		Ok(Params::new(challenge_duration, parts, app_def, nonce))
	}
}
