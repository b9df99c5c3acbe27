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

//! The off-chain core of the Perun state-channel protocol. Participants
//! open a channel backed by on-chain collateral, exchange and co-sign a
//! sequence of off-chain state updates, and eventually settle by publishing
//! the last agreed state to an on-chain adjudicator.
//!
//! The crate provides the per-channel state machine with its persistence
//! overlay, the allocation algebra, the channel registry, and the peer
//! identity handshake. Wallets, the wire transport, and adjudicator
//! implementations are consumed through traits; simulation implementations
//! back the tests and the walkthrough.

pub mod adjudicator;
pub mod allocation;
pub mod encoding;
pub mod error;
pub mod machine;
pub mod params;
pub mod persistence;
pub mod registry;
pub mod sim_wallet;
pub mod state;
pub mod types;
pub mod wallet;
pub mod wire;

pub use adjudicator::{
	Adjudicator, AdjudicatorReq, ChallengeTimeout, Funding, RegisteredEvent, RegisteredSub,
	SimAdjudicator,
};
pub use allocation::{equal_sum, Allocation, Bal, SubAlloc};
pub use error::{Error, Result};
pub use machine::{Phase, StateMachine};
pub use params::Params;
pub use persistence::{ChannelSnapshot, PersistMachine, PersistRestorer};
pub use registry::{Channel, Registry};
pub use state::{sign_state, verify_state_sig, State, Transaction};
pub use types::{AppId, ChannelId, Data, Hash, Idx, Nonce, Version};
pub use wallet::{Account, AddrKey, Address, Backend, Sig};
pub use wire::{exchange_addrs, AuthResponseMsg, Conn, Msg, PingMsg};
