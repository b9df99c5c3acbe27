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
	adjudicator::{AdjudicatorReq, RegisteredEvent},
	allocation::Allocation,
	error::{Error, Result},
	params::Params,
	require,
	state::{put_sig, sign_state, verify_state_sig, State, Transaction},
	types::{ChannelId, Data, Idx},
	wallet::{Account, Backend, Sig},
};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The lifecycle phase of a channel. The current transaction is only valid
/// from `Funding` onward.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash, Serialize, Deserialize)]
pub enum Phase {
	InitActing,
	InitSigning,
	Funding,
	Acting,
	Signing,
	Final,
	Registering,
	Registered,
	Withdrawing,
	Withdrawn,
}

impl std::fmt::Display for Phase {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		std::fmt::Debug::fmt(self, f)
	}
}

/// The per-channel automaton driving a channel through its lifecycle. Every
/// accepted transition produces exactly one canonical signed transaction;
/// guard failures are recoverable errors and never advance the phase.
///
/// The machine is not synchronized; a controller wraps it in a lock.
pub struct StateMachine {
	backend: Arc<dyn Backend>,
	acc: Arc<dyn Account>,
	id: ChannelId,
	idx: Idx,
	params: Params,
	staging_tx: Option<Transaction>,
	current_tx: Option<Transaction>,
	phase: Phase,
}

impl StateMachine {
	/// Creates a fresh channel automaton for the given account, which must
	/// be one of the channel's participants. The signing backend is passed
	/// in explicitly; there is no process-global backend.
	pub fn new(
		backend: Arc<dyn Backend>,
		acc: Arc<dyn Account>,
		params: Params,
	) -> Result<Self> {
		let idx = params
			.index_of(&acc.address())
			.ok_or(Error::InvalidInput)?;
		Ok(Self {
			backend,
			acc,
			id: params.id(),
			idx,
			params,
			staging_tx: None,
			current_tx: None,
			phase: Phase::InitActing,
		})
	}

	pub fn id(&self) -> ChannelId {
		self.id
	}

	pub fn idx(&self) -> Idx {
		self.idx
	}

	pub fn params(&self) -> &Params {
		&self.params
	}

	pub fn phase(&self) -> Phase {
		self.phase
	}

	pub fn staging_tx(&self) -> Option<&Transaction> {
		self.staging_tx.as_ref()
	}

	pub fn current_tx(&self) -> Option<&Transaction> {
		self.current_tx.as_ref()
	}

	/// The staged candidate state, if an update or init is in progress.
	pub fn staging_state(&self) -> Option<&State> {
		self.staging_tx.as_ref().map(|tx| &tx.state)
	}

	/// The last enabled state. Valid from the `Funding` phase onward.
	pub fn current_state(&self) -> Option<&State> {
		self.current_tx.as_ref().map(|tx| &tx.state)
	}

	/// Stages the channel's initial state. The allocation must be valid and
	/// match the participant count.
	pub fn init(&mut self, alloc: Allocation, data: Data) -> Result<()> {
		require!(self.phase == Phase::InitActing, Phase);
		require!(alloc.valid(), Allocation);
		require!(alloc.num_parts() == self.params.num_parts(), Allocation);
		self.staging_tx = Some(Transaction::new(State::new(&self.params, alloc, data)));
		self.set_phase(Phase::InitSigning);
		Ok(())
	}

	/// Computes this participant's signature over the staged state and
	/// records it. Repeated calls return the recorded signature.
	pub fn sig(&mut self) -> Result<Sig> {
		require!(
			matches!(self.phase, Phase::InitSigning | Phase::Signing),
			Phase
		);
		let tx = self.staging_tx.as_ref().ok_or(Error::Phase)?;
		if let Some(sigs) = &tx.sigs {
			if let Some(Some(sig)) = sigs.get(self.idx as usize) {
				return Ok(sig.clone());
			}
		}
		let sig = sign_state(self.acc.as_ref(), &self.params, &tx.state)?;
		let n = self.params.num_parts();
		let idx = self.idx;
		let tx = self.staging_tx.as_mut().ok_or(Error::Phase)?;
		put_sig(&mut tx.sigs, n, idx, sig.clone())?;
		trace!("channel {}: local sig for slot {}", self.id, idx);
		Ok(sig)
	}

	/// Records another participant's signature on the staged state. The
	/// signature must verify against the participant's address, and the
	/// slot must be empty or hold the identical value.
	pub fn add_sig(&mut self, idx: Idx, sig: Sig) -> Result<()> {
		require!(
			matches!(self.phase, Phase::InitSigning | Phase::Signing),
			Phase
		);
		require!((idx as usize) < self.params.num_parts(), InvalidInput);
		let tx = self.staging_tx.as_ref().ok_or(Error::Phase)?;
		require!(
			verify_state_sig(
				self.backend.as_ref(),
				&self.params,
				&tx.state,
				&sig,
				&self.params.parts[idx as usize],
			)?,
			Signature
		);
		let n = self.params.num_parts();
		let tx = self.staging_tx.as_mut().ok_or(Error::Phase)?;
		put_sig(&mut tx.sigs, n, idx, sig)?;
		trace!("channel {}: added sig for slot {}", self.id, idx);
		Ok(())
	}

	/// Promotes the fully signed initial transaction. All signatures must
	/// be present and verify.
	pub fn enable_init(&mut self) -> Result<()> {
		require!(self.phase == Phase::InitSigning, Phase);
		self.verify_staging_sigs()?;
		self.promote_staging(Phase::Funding)
	}

	/// Marks the channel's on-chain funding as complete.
	pub fn set_funded(&mut self) -> Result<()> {
		require!(self.phase == Phase::Funding, Phase);
		self.set_phase(Phase::Acting);
		Ok(())
	}

	/// Stages a state update authored by participant `actor`. The update
	/// must be a legal successor of the current state.
	pub fn update(&mut self, next: State, actor: Idx) -> Result<()> {
		require!(self.phase == Phase::Acting, Phase);
		require!((actor as usize) < self.params.num_parts(), InvalidInput);
		let cur = self.current_tx.as_ref().ok_or(Error::Phase)?;
		cur.state.valid_transition(&next)?;
		debug!(
			"channel {}: update to version {} by {}",
			self.id, next.version, actor
		);
		self.staging_tx = Some(Transaction::new(next));
		self.set_phase(Phase::Signing);
		Ok(())
	}

	/// Promotes the fully signed staged update.
	pub fn enable_update(&mut self) -> Result<()> {
		require!(self.phase == Phase::Signing, Phase);
		self.require_staging_signed()?;
		self.promote_staging(Phase::Acting)
	}

	/// Promotes a fully signed final state, closing the update phase for
	/// good.
	pub fn enable_final(&mut self) -> Result<()> {
		require!(self.phase == Phase::Signing, Phase);
		self.require_staging_signed()?;
		let tx = self.staging_tx.as_ref().ok_or(Error::Phase)?;
		require!(tx.state.is_final, Phase);
		self.promote_staging(Phase::Final)
	}

	/// Drops the staged update and returns to the acting phase.
	pub fn discard_update(&mut self) -> Result<()> {
		require!(self.phase == Phase::Signing, Phase);
		self.staging_tx = None;
		self.set_phase(Phase::Acting);
		Ok(())
	}

	/// Marks the start of on-chain registration.
	pub fn set_registering(&mut self) -> Result<()> {
		require!(
			matches!(self.phase, Phase::Acting | Phase::Final),
			Phase
		);
		self.set_phase(Phase::Registering);
		Ok(())
	}

	/// Records the on-chain registration witnessed by the given event.
	pub fn set_registered(&mut self, evt: &RegisteredEvent) -> Result<()> {
		require!(self.phase == Phase::Registering, Phase);
		require!(evt.channel == self.id, InvalidInput);
		self.set_phase(Phase::Registered);
		Ok(())
	}

	/// Marks the start of the on-chain withdrawal.
	pub fn set_withdrawing(&mut self) -> Result<()> {
		require!(
			matches!(self.phase, Phase::Registered | Phase::Final),
			Phase
		);
		self.set_phase(Phase::Withdrawing);
		Ok(())
	}

	/// Marks the channel's funds as withdrawn. The channel is finished.
	pub fn set_withdrawn(&mut self) -> Result<()> {
		require!(self.phase == Phase::Withdrawing, Phase);
		self.set_phase(Phase::Withdrawn);
		Ok(())
	}

	/// Builds the adjudicator request for the current transaction, for
	/// registration, refutation, or withdrawal.
	pub fn adjudicator_req(&self) -> Result<AdjudicatorReq> {
		let tx = self.current_tx.as_ref().ok_or(Error::Phase)?;
		Ok(AdjudicatorReq {
			params: self.params.clone(),
			idx: self.idx,
			tx: tx.clone(),
		})
	}

	/// A copy of the channel's observable state, as mirrored by the
	/// persistence layer.
	pub fn snapshot(&self) -> crate::persistence::ChannelSnapshot {
		crate::persistence::ChannelSnapshot {
			idx: self.idx,
			params: self.params.clone(),
			staging_tx: self.staging_tx.clone(),
			current_tx: self.current_tx.clone(),
			phase: self.phase,
		}
	}

	fn require_staging_signed(&self) -> Result<()> {
		let tx = self.staging_tx.as_ref().ok_or(Error::Phase)?;
		require!(tx.fully_signed(self.params.num_parts()), Signature);
		Ok(())
	}

	fn verify_staging_sigs(&self) -> Result<()> {
		self.require_staging_signed()?;
		let tx = self.staging_tx.as_ref().ok_or(Error::Phase)?;
		let sigs = tx.sigs.as_ref().ok_or(Error::Signature)?;
		for (i, addr) in self.params.parts.iter().enumerate() {
			let sig = sigs[i].as_ref().ok_or(Error::Signature)?;
			require!(
				verify_state_sig(self.backend.as_ref(), &self.params, &tx.state, sig, addr)?,
				Signature
			);
		}
		Ok(())
	}

	fn promote_staging(&mut self, to: Phase) -> Result<()> {
		self.current_tx = self.staging_tx.take();
		self.set_phase(to);
		Ok(())
	}

	fn set_phase(&mut self, to: Phase) {
		debug!("channel {}: phase {} -> {}", self.id, self.phase, to);
		self.phase = to;
	}
}
