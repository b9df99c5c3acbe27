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
	allocation::{equal_sum, Allocation, Bal},
	encoding::{put_u64, put_u8, Decode, Encode, Reader},
	error::{Error, Result},
	params::Params,
	require,
	types::{ChannelId, Data, Hash, Idx, Version},
	wallet::{Account, Address, Backend, Sig},
};
use serde::{Deserialize, Serialize};

/// An immutable channel state. A new state is only ever produced by the
/// update protocol; mutation in place is prohibited.
#[derive(PartialEq, Eq, Clone, Debug, Serialize, Deserialize)]
pub struct State {
	/// The channel's unique identifier.
	pub channel: ChannelId,
	/// The channel's current state revision number.
	pub version: Version,
	/// The channel's asset allocation.
	pub allocation: Allocation,
	/// Opaque application data.
	pub data: Data,
	/// Whether the channel is finalized. No updates may follow a final
	/// state and its funds can be withdrawn immediately.
	pub is_final: bool,
}

/// A channel state together with the participants' signatures on it. The
/// signature vector is lazily allocated; `None` means no signature is known
/// yet, and individual entries are `None` until the respective participant
/// has signed.
#[derive(PartialEq, Eq, Clone, Debug, Serialize, Deserialize)]
pub struct Transaction {
	pub state: State,
	pub sigs: Option<Vec<Option<Sig>>>,
}

impl State {
	/// Creates a channel's initial state: version 0, not final.
	pub fn new(params: &Params, allocation: Allocation, data: Data) -> Self {
		Self {
			channel: params.id(),
			version: 0,
			allocation,
			data,
			is_final: false,
		}
	}

	/// Calculates the total funds per asset in the state.
	pub fn total(&self) -> Vec<Bal> {
		self.allocation.sum()
	}

	/// Channels that are in their initial state may not yet be fully
	/// funded, but may be registered already for disputes. This is to
	/// retrieve funds of channels where the funding phase does not
	/// complete.
	pub fn may_be_underfunded(&self) -> bool {
		self.version == 0 && !self.is_final
	}

	/// Checks that `next` is a legal successor of this state: same channel,
	/// version incremented by exactly one, no successor to a final state,
	/// and per-asset totals conserved.
	pub fn valid_transition(&self, next: &State) -> Result<()> {
		require!(next.channel == self.channel, Version);
		require!(!self.is_final, Version);
		require!(next.version == self.version + 1, Version);
		require!(next.allocation.valid(), Allocation);
		require!(
			equal_sum(&self.allocation.sum(), &next.allocation.sum())?,
			Allocation
		);
		Ok(())
	}

	/// Produces a successor of this state carrying the given allocation and
	/// data. The caller still has to pass the result through the update
	/// protocol.
	pub fn next(&self, allocation: Allocation, data: Data) -> State {
		State {
			channel: self.channel,
			version: self.version + 1,
			allocation,
			data,
			is_final: self.is_final,
		}
	}
}

/// The message signed by every participant to authorize a state: the hash
/// of the canonical parameter encoding followed by the canonical state
/// encoding.
pub fn state_sig_msg(params: &Params, state: &State) -> Vec<u8> {
	let mut enc = params.encoded();
	state.encode(&mut enc);
	Hash::digest(&enc).0.to_vec()
}

/// Signs a channel state on behalf of the given account.
pub fn sign_state(acc: &dyn Account, params: &Params, state: &State) -> Result<Sig> {
	acc.sign_data(&state_sig_msg(params, state))
}

/// Verifies a participant's signature on a channel state.
pub fn verify_state_sig(
	backend: &dyn Backend,
	params: &Params,
	state: &State,
	sig: &Sig,
	addr: &Address,
) -> Result<bool> {
	backend.verify_signature(&state_sig_msg(params, state), sig, addr)
}

impl Transaction {
	pub fn new(state: State) -> Self {
		Self { state, sigs: None }
	}

	/// Whether all `n` participants have signed.
	pub fn fully_signed(&self, n: usize) -> bool {
		match &self.sigs {
			Some(sigs) => sigs.len() == n && sigs.iter().all(Option::is_some),
			None => false,
		}
	}

	/// Checks that the transaction is authenticated by all participants and
	/// matches the supplied parameters.
	pub fn validate_fully_signed(&self, backend: &dyn Backend, params: &Params) -> Result<()> {
		let state = &self.state;
		require!(state.channel == params.id(), InvalidInput);
		require!(state.allocation.valid(), InvalidInput);
		require!(
			state.allocation.num_parts() == params.num_parts(),
			InvalidInput
		);
		let sigs = self.sigs.as_ref().ok_or(Error::Authentication)?;
		require!(sigs.len() == params.num_parts(), InvalidInput);

		for (i, addr) in params.parts.iter().enumerate() {
			let sig = sigs[i].as_ref().ok_or(Error::Authentication)?;
			require!(
				verify_state_sig(backend, params, state, sig, addr)?,
				Authentication
			);
		}

		Ok(())
	}

	/// Like `validate_fully_signed`, but additionally requires the state to
	/// be final.
	pub fn validate_final(&self, backend: &dyn Backend, params: &Params) -> Result<()> {
		require!(self.state.is_final, NotFinalized);
		self.validate_fully_signed(backend, params)
	}
}

/// Signature-vector equality under the loose law: a missing vector is equal
/// to a vector of all-missing entries of any length. Empty and
/// uninitialized-per-slot are observationally identical, so the persistence
/// layer treats both as canonically equivalent.
pub fn sigs_equal_loose(a: &Option<Vec<Option<Sig>>>, b: &Option<Vec<Option<Sig>>>) -> bool {
	let nil = |sigs: &Option<Vec<Option<Sig>>>| match sigs {
		None => true,
		Some(sigs) => sigs.iter().all(Option::is_none),
	};
	match (nil(a), nil(b)) {
		(true, true) => true,
		(false, false) => a == b,
		_ => false,
	}
}

/// Transaction equality with exact states and loose signature vectors.
pub fn tx_equal_loose(a: &Transaction, b: &Transaction) -> bool {
	a.state == b.state && sigs_equal_loose(&a.sigs, &b.sigs)
}

impl Encode for State {
	fn encode(&self, w: &mut Vec<u8>) {
		self.channel.encode(w);
		put_u64(w, self.version);
		self.allocation.encode(w);
		self.data.encode(w);
		put_u8(w, self.is_final as u8);
	}
}

impl Decode for State {
	fn decode(r: &mut Reader) -> Result<Self> {
		let channel = ChannelId::decode(r)?;
		let version = r.u64()?;
		let allocation = Allocation::decode(r)?;
		let data = Data::decode(r)?;
		let is_final = match r.u8()? {
			0 => false,
			1 => true,
			_ => return Err(Error::InvalidInput),
		};
		Ok(State {
			channel,
			version,
			allocation,
			data,
			is_final,
		})
	}
}

/// Fills a participant's slot in a lazily allocated signature vector.
/// An occupied slot is only overwritten by a bit-identical signature.
pub fn put_sig(
	sigs: &mut Option<Vec<Option<Sig>>>,
	n: usize,
	idx: Idx,
	sig: Sig,
) -> Result<()> {
	let sigs = sigs.get_or_insert_with(|| vec![None; n]);
	require!((idx as usize) < sigs.len(), InvalidInput);
	let slot = &mut sigs[idx as usize];
	if let Some(existing) = slot {
		require!(*existing == sig, Signature);
		return Ok(());
	}
	*slot = Some(sig);
	Ok(())
}
