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
	allocation::Bal,
	error::{Error, Result},
	params::Params,
	require,
	state::{State, Transaction},
	types::{ChannelId, Idx, Timestamp, Version},
	wallet::{Address, Backend},
};
use async_trait::async_trait;
use log::{debug, info};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, Mutex};

/// The current wall clock in nanoseconds.
pub fn now_nanos() -> Timestamp {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_nanos() as u64)
		.unwrap_or_default()
}

/// A request to the adjudicator, carrying the channel parameters, the
/// requesting participant's index, and the fully signed transaction to act
/// on.
#[derive(Clone, Debug)]
pub struct AdjudicatorReq {
	pub params: Params,
	pub idx: Idx,
	pub tx: Transaction,
}

/// The challenge timeout attached to a registration. Waiting never imposes
/// a deadline of its own; callers cancel by dropping or timing out the
/// future.
#[derive(Clone, Debug)]
pub struct ChallengeTimeout {
	when: Timestamp,
}

impl ChallengeTimeout {
	pub fn at(when: Timestamp) -> Self {
		Self { when }
	}

	pub fn is_elapsed(&self) -> bool {
		now_nanos() >= self.when
	}

	/// Resolves once the challenge window has passed.
	pub async fn wait(&self) -> Result<()> {
		loop {
			let now = now_nanos();
			if now >= self.when {
				return Ok(());
			}
			tokio::time::sleep(std::time::Duration::from_nanos(self.when - now)).await;
		}
	}
}

/// Witnesses an on-chain registration of a channel state.
#[derive(Clone, Debug)]
pub struct RegisteredEvent {
	pub channel: ChannelId,
	pub version: Version,
	pub timeout: ChallengeTimeout,
}

/// A stream of registration events for one channel. Only events occurring
/// after the subscription are delivered.
pub struct RegisteredSub {
	rx: mpsc::UnboundedReceiver<RegisteredEvent>,
}

impl RegisteredSub {
	pub async fn next(&mut self) -> Option<RegisteredEvent> {
		self.rx.recv().await
	}

	pub fn close(self) {}
}

/// The minimal adjudicator surface the core consumes. Implementations talk
/// to the on-chain dispute contract.
#[async_trait]
pub trait Adjudicator: Send + Sync {
	/// Registers the request's state on-chain, starting or refuting a
	/// dispute.
	async fn register(&self, req: &AdjudicatorReq) -> Result<RegisteredEvent>;
	/// Subscribes to registration events concerning the given channel.
	async fn subscribe_registered(&self, params: &Params) -> Result<RegisteredSub>;
	/// Withdraws the requesting participant's funds from a settled channel.
	/// Fails when the last registered version is newer than the request's.
	async fn withdraw(&self, req: &AdjudicatorReq) -> Result<()>;
}

/// Identifies the funds belonging to a certain participant within a
/// certain channel.
#[derive(PartialEq, Eq, Clone, Debug, Hash)]
pub struct Funding {
	/// The channel's unique identifier.
	pub channel: ChannelId,
	/// The funds' owner within the channel.
	pub participant: Address,
}

impl Funding {
	pub fn new(channel: ChannelId, participant: Address) -> Self {
		Self {
			channel,
			participant,
		}
	}
}

/// A registered channel's state, as seen by the adjudicator. Represents a
/// channel after a conclusion or dispute. The timeout, in combination with
/// the state's finality flag, determines whether the channel is settled and
/// its funds ready for withdrawing.
#[derive(Clone, Debug)]
pub struct RegisteredState {
	pub state: State,
	/// The challenge timeout after which the currently registered state
	/// becomes available for withdrawing. Ignored for finalized channels.
	pub timeout: Timestamp,
}

impl RegisteredState {
	pub fn conclude(backend: &dyn Backend, params: &Params, tx: &Transaction) -> Result<Self> {
		tx.validate_final(backend, params)?;
		Ok(Self {
			state: tx.state.clone(),
			timeout: Default::default(),
		})
	}

	pub fn dispute(
		backend: &dyn Backend,
		params: &Params,
		tx: &Transaction,
		now: Timestamp,
	) -> Result<Self> {
		tx.validate_fully_signed(backend, params)?;
		Ok(Self {
			state: tx.state.clone(),
			timeout: now + params.challenge_duration,
		})
	}

	pub fn settled(&self, now: Timestamp) -> bool {
		self.state.is_final || now >= self.timeout
	}
}

struct Ledger {
	/// Tracks all deposits for unregistered channels. For registered
	/// channels, tracks withdrawable balances instead.
	holdings: HashMap<Funding, Vec<Bal>>,
	/// Tracks all registered channels.
	channels: HashMap<ChannelId, RegisteredState>,
	/// Registration event subscribers, per channel.
	subs: HashMap<ChannelId, Vec<mpsc::UnboundedSender<RegisteredEvent>>>,
}

/// An in-process adjudicator with the semantics of the on-chain dispute
/// contract: deposits, dispute registration with refutation inside the
/// challenge window, and settled-only withdrawal. Backs the tests and the
/// walkthrough.
pub struct SimAdjudicator {
	backend: Arc<dyn Backend>,
	inner: Mutex<Ledger>,
}

fn add_bals(acc: &mut Vec<Bal>, vals: &[Bal]) {
	if acc.len() < vals.len() {
		acc.resize(vals.len(), Bal::default());
	}
	for (a, v) in acc.iter_mut().zip(vals) {
		*a += v;
	}
}

/// Whether `total` covers `outcome` in every asset.
fn covers(total: &[Bal], outcome: &[Bal]) -> bool {
	total.len() == outcome.len() && total.iter().zip(outcome).all(|(t, o)| t >= o)
}

impl SimAdjudicator {
	pub fn new(backend: Arc<dyn Backend>) -> Arc<Self> {
		Arc::new(Self {
			backend,
			inner: Mutex::new(Ledger {
				holdings: HashMap::new(),
				channels: HashMap::new(),
				subs: HashMap::new(),
			}),
		})
	}

	/// Deposits funds for the specified participant into the specified
	/// channel.
	pub async fn deposit(&self, funding: Funding, amount: Vec<Bal>) -> Result<()> {
		let mut l = self.inner.lock().await;
		add_bals(l.holdings.entry(funding).or_default(), &amount);
		Ok(())
	}

	/// Returns the funds deposited for a channel's specified participant,
	/// if any.
	pub async fn query_holdings(&self, funding: &Funding) -> Option<Vec<Bal>> {
		self.inner.lock().await.holdings.get(funding).cloned()
	}

	/// Queries the latest registered state for a channel and its dispute
	/// timeout.
	pub async fn registered_state(&self, id: ChannelId) -> Option<RegisteredState> {
		self.inner.lock().await.channels.get(&id).cloned()
	}

	/// Calculates the total funds held in a channel per asset. If the
	/// channel is unknown and there are no deposited funds for it, returns
	/// an empty total.
	pub async fn holdings_total(&self, params: &Params) -> Vec<Bal> {
		let l = self.inner.lock().await;
		Self::holdings_total_locked(&l, params)
	}

	fn holdings_total_locked(l: &Ledger, params: &Params) -> Vec<Bal> {
		let id = params.id();
		let mut acc = Vec::new();
		for p in params.parts.iter() {
			if let Some(held) = l.holdings.get(&Funding::new(id, p.clone())) {
				add_bals(&mut acc, held);
			}
		}
		acc
	}

	/// Settles a finalized channel and makes its final funds distribution
	/// withdrawable.
	pub async fn conclude_at(
		&self,
		params: &Params,
		tx: &Transaction,
		now: Timestamp,
	) -> Result<RegisteredEvent> {
		let mut l = self.inner.lock().await;
		if let Some(old) = l.channels.get(&tx.state.channel) {
			require!(!old.settled(now), AlreadyConcluded);
		}
		let reg = RegisteredState::conclude(self.backend.as_ref(), params, tx)?;
		Self::register_channel(&mut l, params, reg)
	}

	/// Starts or refutes a dispute for a non-finalized channel. Within the
	/// challenge window, any participant may register a more recent state,
	/// which supersedes the previous registration and restarts the window.
	pub async fn dispute_at(
		&self,
		params: &Params,
		tx: &Transaction,
		now: Timestamp,
	) -> Result<RegisteredEvent> {
		let mut l = self.inner.lock().await;
		if let Some(old) = l.channels.get(&tx.state.channel) {
			require!(!old.settled(now), AlreadyConcluded);
			require!(old.state.version < tx.state.version, OutdatedState);
		}
		let reg = RegisteredState::dispute(self.backend.as_ref(), params, tx, now)?;
		Self::register_channel(&mut l, params, reg)
	}

	/// Withdraws the specified participant's funds from a settled channel.
	/// Returns the withdrawn amounts; repeated withdrawals withdraw
	/// nothing further.
	pub async fn withdraw_at(&self, req: &AdjudicatorReq, now: Timestamp) -> Result<Vec<Bal>> {
		let id = req.tx.state.channel;
		let mut l = self.inner.lock().await;
		match l.channels.get(&id) {
			None => Err(Error::NotFinalized),
			Some(reg) => {
				require!(reg.settled(now), NotFinalized);
				require!(reg.state.version == req.tx.state.version, OutdatedState);
				let part = req
					.params
					.parts
					.get(req.idx as usize)
					.ok_or(Error::InvalidInput)?;
				let funding = Funding::new(id, part.clone());
				info!("adjudicator: withdraw {} by {}", id, req.idx);
				Ok(l.holdings.remove(&funding).unwrap_or_default())
			}
		}
	}

	/// Updates the holdings associated with a channel to the outcome of the
	/// supplied state, then registers the state and notifies subscribers.
	/// If the state is the channel's initial state, the holdings are not
	/// updated, as initial states are allowed to be under-funded and are
	/// otherwise expected to match the deposit distribution exactly if
	/// fully funded.
	fn register_channel(
		l: &mut Ledger,
		params: &Params,
		reg: RegisteredState,
	) -> Result<RegisteredEvent> {
		let total = Self::holdings_total_locked(l, params);
		if !covers(&total, &reg.state.total()) {
			require!(reg.state.may_be_underfunded(), InsufficientFunding);
		} else {
			Self::update_holdings(l, params, &reg.state);
		}

		let evt = RegisteredEvent {
			channel: reg.state.channel,
			version: reg.state.version,
			timeout: ChallengeTimeout::at(reg.timeout),
		};
		info!(
			"adjudicator: registered {} version {}",
			evt.channel, evt.version
		);
		l.channels.insert(reg.state.channel, reg);
		if let Some(subs) = l.subs.get_mut(&evt.channel) {
			subs.retain(|tx| tx.send(evt.clone()).is_ok());
		}
		Ok(evt)
	}

	/// Pushes a state's funding allocation into the channel's holdings
	/// mapping.
	fn update_holdings(l: &mut Ledger, params: &Params, state: &State) {
		for (i, outcome) in state.allocation.of_parts.iter().enumerate() {
			l.holdings.insert(
				Funding::new(state.channel, params.parts[i].clone()),
				outcome.clone(),
			);
		}
	}
}

#[async_trait]
impl Adjudicator for SimAdjudicator {
	async fn register(&self, req: &AdjudicatorReq) -> Result<RegisteredEvent> {
		let now = now_nanos();
		if req.tx.state.is_final {
			self.conclude_at(&req.params, &req.tx, now).await
		} else {
			self.dispute_at(&req.params, &req.tx, now).await
		}
	}

	async fn subscribe_registered(&self, params: &Params) -> Result<RegisteredSub> {
		let (tx, rx) = mpsc::unbounded_channel();
		let mut l = self.inner.lock().await;
		l.subs.entry(params.id()).or_default().push(tx);
		debug!("adjudicator: new subscription for {}", params.id());
		Ok(RegisteredSub { rx })
	}

	async fn withdraw(&self, req: &AdjudicatorReq) -> Result<()> {
		self.withdraw_at(req, now_nanos()).await.map(|_| ())
	}
}
