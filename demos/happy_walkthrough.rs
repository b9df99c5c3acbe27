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

use log::{error, info};
use perun_channel::persistence::PersistMachine;
use perun_channel::test::{self, MemRestorer};
use perun_channel::*;
use std::sync::Arc;

/// Holds all state for this demo.
struct Demo {
	setup: test::Setup,
	registry: Arc<Registry>,
	restorer: Arc<MemRestorer>,
}

/// Entry point for this example.
#[tokio::main]
async fn main() {
	pretty_env_logger::init();

	if let Err(err) = walkthrough().await {
		error!("{}", err);
	}
}

/// Walkthrough through the collaborative channel protocol: open a channel,
/// move funds off-chain, finalize, conclude on-chain, and withdraw.
async fn walkthrough() -> Result<()> {
	let mut demo = Demo::new().await;
	let (alice, bob) = (0, 1);

	// Query on-chain balances.
	demo.query_holdings(alice).await;
	demo.query_holdings(bob).await;
	// Deposit for Alice and Bob and open the channel.
	let ch = demo.open().await?;
	// Query on-chain balances.
	demo.query_holdings(alice).await;
	demo.query_holdings(bob).await;
	// Update off-chain balances: swap the outcome.
	demo.swap_balances(&ch).await?;
	// Finalize and conclude the channel.
	demo.finalize(&ch).await?;
	demo.conclude(&ch).await?;
	// Withdraw balances.
	demo.withdraw(&ch, alice).await?;
	demo.withdraw(&ch, bob).await?;
	// Query on-chain balances.
	demo.query_holdings(alice).await;
	demo.query_holdings(bob).await;
	// Tear the channel down.
	ch.machine().await.remove().await?;
	ch.close()?;

	Ok(())
}

impl Demo {
	async fn new() -> Self {
		let setup = test::Setup::new(false, false).await;
		Self {
			setup,
			registry: Registry::new(),
			restorer: MemRestorer::new(),
		}
	}

	/// Opens the channel: stages the initial state, collects all
	/// signatures, deposits the initial outcome, and registers the funded
	/// controller.
	async fn open(&mut self) -> Result<Arc<Channel>> {
		let s = &self.setup;
		info!("Opening          channel: {}", s.params.id());

		let m = s.machine(0);
		let mut pm = PersistMachine::new(m, self.restorer.clone(), &s.parts).await?;
		pm.init(s.state.allocation.clone(), Data::default()).await?;
		self.sign_all(&mut pm).await?;
		pm.enable_init().await?;

		for (i, _) in s.parts.iter().enumerate() {
			let amount = s.state.allocation.of_parts[i].clone();
			info!(
				"Depositing       channel: {} for peer IDx: {}, add: {:?}",
				s.params.id(),
				i,
				amount
			);
			s.adj.deposit(s.funding(i), amount).await?;
		}
		pm.set_funded().await?;

		let ch = Channel::new(pm);
		self.registry.put(ch.clone());
		Ok(ch)
	}

	/// Collects every participant's signature on the staged state.
	async fn sign_all(&self, pm: &mut PersistMachine) -> Result<()> {
		pm.sig().await?;
		let staged = match pm.staging_state() {
			Some(state) => state.clone(),
			None => return Err(Error::Phase),
		};
		for i in 0..self.setup.parts.len() {
			let sig = self.setup.sign_for(&staged, i);
			pm.add_sig(i as Idx, sig).await?;
		}
		Ok(())
	}

	/// One off-chain update swapping Alice's and Bob's balances.
	async fn swap_balances(&self, ch: &Channel) -> Result<()> {
		let mut pm = ch.machine().await;
		let cur = match pm.current_state() {
			Some(state) => state.clone(),
			None => return Err(Error::Phase),
		};
		let mut alloc = cur.allocation.clone();
		alloc.of_parts.swap(0, 1);
		info!("Updating         channel: {} (swap balances)", pm.id());
		pm.update(cur.next(alloc, Data::default()), 0).await?;
		self.sign_all(&mut pm).await?;
		pm.enable_update().await
	}

	/// A final update fixing the current outcome for good.
	async fn finalize(&self, ch: &Channel) -> Result<()> {
		let mut pm = ch.machine().await;
		let cur = match pm.current_state() {
			Some(state) => state.clone(),
			None => return Err(Error::Phase),
		};
		let mut fin = cur.next(cur.allocation.clone(), Data::default());
		fin.is_final = true;
		info!("Finalizing       channel: {}", pm.id());
		pm.update(fin, 0).await?;
		self.sign_all(&mut pm).await?;
		pm.enable_final().await
	}

	/// Concludes the finalized channel on-chain.
	async fn conclude(&self, ch: &Channel) -> Result<()> {
		let mut pm = ch.machine().await;
		info!("Concluding       channel: {}", pm.id());
		pm.set_registering().await?;
		let req = pm.adjudicator_req()?;
		let evt = self.setup.adj.register(&req).await?;
		info!("state is final: {}", req.tx.state.is_final);
		pm.set_registered(&evt).await
	}

	/// Withdraws a participant's outcome from the settled channel.
	async fn withdraw(&self, ch: &Channel, part: usize) -> Result<()> {
		let mut pm = ch.machine().await;
		info!(
			"Withdrawing      channel: {} for peer IDx: {}",
			pm.id(),
			part
		);
		if pm.phase() != Phase::Withdrawing {
			pm.set_withdrawing().await?;
		}
		let mut req = pm.adjudicator_req()?;
		req.idx = part as Idx;
		self.setup.adj.withdraw(&req).await?;
		if part + 1 == self.setup.parts.len() {
			pm.set_withdrawn().await?;
		}
		Ok(())
	}

	async fn query_holdings(&self, part: usize) {
		let funding = self.setup.funding(part);
		let amount = self.setup.adj.query_holdings(&funding).await;
		info!(
			"Querying deposit channel: {} for peer IDx: {}, now: {:?}",
			funding.channel, part, amount
		);
	}
}
