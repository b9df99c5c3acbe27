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
	adjudicator::RegisteredEvent,
	allocation::Allocation,
	error::{Error, Result},
	machine::{Phase, StateMachine},
	params::Params,
	state::{tx_equal_loose, State, Transaction},
	types::{ChannelId, Data, Idx},
	wallet::{Address, Sig},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::sync::Arc;

/// The observable state of a channel, as handed to and restored from a
/// [`PersistRestorer`].
#[derive(PartialEq, Clone, Debug, Serialize, Deserialize)]
pub struct ChannelSnapshot {
	pub idx: Idx,
	pub params: Params,
	pub staging_tx: Option<Transaction>,
	pub current_tx: Option<Transaction>,
	pub phase: Phase,
}

impl ChannelSnapshot {
	pub fn id(&self) -> ChannelId {
		self.params.id()
	}

	/// Snapshot equality with exact fields except for the staging signature
	/// vector, which is compared under the loose law: a missing vector
	/// equals a vector of all-missing entries of any length.
	pub fn eq_loose(&self, other: &ChannelSnapshot) -> bool {
		let staging = match (&self.staging_tx, &other.staging_tx) {
			(None, None) => true,
			(Some(a), Some(b)) => tx_equal_loose(a, b),
			_ => false,
		};
		self.idx == other.idx
			&& self.params == other.params
			&& self.current_tx == other.current_tx
			&& self.phase == other.phase
			&& staging
	}
}

/// Durable storage for channel machines. The overlay invokes one hook per
/// mutation, synchronously and at most once per state change, so that a
/// crash between operations loses at most the last unacknowledged call.
/// Implementations are shared across all channels and must provide per-id
/// serializability.
#[async_trait]
pub trait PersistRestorer: Send + Sync {
	/// A channel machine was created. The snapshot carries the full initial
	/// channel source so that restoration can reproduce it.
	async fn channel_created(&self, c: &ChannelSnapshot, peers: &[Address]) -> Result<()>;
	/// A transaction was staged by `init` or `update`.
	async fn staging(&self, id: ChannelId, tx: &Transaction) -> Result<()>;
	/// A signature was added to the staged transaction.
	async fn sig_added(&self, id: ChannelId, idx: Idx, sig: &Sig) -> Result<()>;
	/// A staged transaction became the current one.
	async fn enabled(&self, id: ChannelId, current: &Transaction) -> Result<()>;
	/// The channel changed its lifecycle phase.
	async fn phase_changed(&self, id: ChannelId, phase: Phase) -> Result<()>;
	/// The channel's funds were withdrawn.
	async fn withdrawn(&self, id: ChannelId) -> Result<()>;
	/// The channel was torn down for good. Restoring it afterwards fails.
	async fn channel_removed(&self, id: ChannelId) -> Result<()>;
	/// Restores a channel snapshot. Unknown ids are an error.
	async fn restore_channel(&self, id: ChannelId) -> Result<ChannelSnapshot>;
}

/// A write-through wrapper around a [`StateMachine`] that mirrors every
/// successful mutation to a [`PersistRestorer`]. Hook failures are surfaced
/// as [`Error::Persistence`]-class errors after the machine operation
/// already took effect; nothing is rolled back.
pub struct PersistMachine {
	m: StateMachine,
	pr: Arc<dyn PersistRestorer>,
}

impl Deref for PersistMachine {
	type Target = StateMachine;

	fn deref(&self) -> &StateMachine {
		&self.m
	}
}

impl PersistMachine {
	/// Wraps a machine and persists its creation.
	pub async fn new(
		m: StateMachine,
		pr: Arc<dyn PersistRestorer>,
		peers: &[Address],
	) -> Result<Self> {
		pr.channel_created(&m.snapshot(), peers).await?;
		Ok(Self { m, pr })
	}

	pub async fn init(&mut self, alloc: Allocation, data: Data) -> Result<()> {
		let from = self.m.phase();
		self.m.init(alloc, data)?;
		let tx = self.m.staging_tx().ok_or(Error::Phase)?;
		self.pr.staging(self.m.id(), tx).await?;
		self.persist_phase(from).await
	}

	pub async fn sig(&mut self) -> Result<Sig> {
		let sig = self.m.sig()?;
		self.pr.sig_added(self.m.id(), self.m.idx(), &sig).await?;
		Ok(sig)
	}

	pub async fn add_sig(&mut self, idx: Idx, sig: Sig) -> Result<()> {
		self.m.add_sig(idx, sig.clone())?;
		self.pr.sig_added(self.m.id(), idx, &sig).await
	}

	pub async fn enable_init(&mut self) -> Result<()> {
		let from = self.m.phase();
		self.m.enable_init()?;
		self.persist_enabled(from).await
	}

	pub async fn set_funded(&mut self) -> Result<()> {
		let from = self.m.phase();
		self.m.set_funded()?;
		self.persist_phase(from).await
	}

	pub async fn update(&mut self, next: State, actor: Idx) -> Result<()> {
		let from = self.m.phase();
		self.m.update(next, actor)?;
		let tx = self.m.staging_tx().ok_or(Error::Phase)?;
		self.pr.staging(self.m.id(), tx).await?;
		self.persist_phase(from).await
	}

	pub async fn enable_update(&mut self) -> Result<()> {
		let from = self.m.phase();
		self.m.enable_update()?;
		self.persist_enabled(from).await
	}

	pub async fn enable_final(&mut self) -> Result<()> {
		let from = self.m.phase();
		self.m.enable_final()?;
		self.persist_enabled(from).await
	}

	pub async fn discard_update(&mut self) -> Result<()> {
		let from = self.m.phase();
		self.m.discard_update()?;
		self.persist_phase(from).await
	}

	pub async fn set_registering(&mut self) -> Result<()> {
		let from = self.m.phase();
		self.m.set_registering()?;
		self.persist_phase(from).await
	}

	pub async fn set_registered(&mut self, evt: &RegisteredEvent) -> Result<()> {
		let from = self.m.phase();
		self.m.set_registered(evt)?;
		self.persist_phase(from).await
	}

	pub async fn set_withdrawing(&mut self) -> Result<()> {
		let from = self.m.phase();
		self.m.set_withdrawing()?;
		self.persist_phase(from).await
	}

	pub async fn set_withdrawn(&mut self) -> Result<()> {
		let from = self.m.phase();
		self.m.set_withdrawn()?;
		self.persist_phase(from).await?;
		self.pr.withdrawn(self.m.id()).await
	}

	/// Final teardown: removes the channel from durable storage.
	pub async fn remove(&self) -> Result<()> {
		self.pr.channel_removed(self.m.id()).await
	}

	async fn persist_enabled(&self, from: Phase) -> Result<()> {
		let tx = self.m.current_tx().ok_or(Error::Phase)?;
		self.pr.enabled(self.m.id(), tx).await?;
		self.persist_phase(from).await
	}

	async fn persist_phase(&self, from: Phase) -> Result<()> {
		if from != self.m.phase() {
			self.pr.phase_changed(self.m.id(), self.m.phase()).await?;
		}
		Ok(())
	}
}
