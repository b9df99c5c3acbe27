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
	allocation::Allocation,
	error::{Error, Result},
	params::Params,
	require,
	state::State,
	types::{ChannelId, Data, Idx, Version},
	wallet::{Account, Address, Backend, Sig},
};
use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Domain separation tag for handshake signatures.
const AUTH_TAG: &[u8] = b"perun/auth-response";

/// Proves ownership of an address to a freshly connected peer.
#[derive(PartialEq, Eq, Clone, Debug, Serialize, Deserialize)]
pub struct AuthResponseMsg {
	pub address: Address,
	pub sig: Sig,
}

/// A keep-alive probe. Also serves as the canonical wrong first message in
/// handshake tests.
#[derive(PartialEq, Eq, Clone, Debug, Serialize, Deserialize)]
pub struct PingMsg;

/// Proposes a new channel to a peer.
#[derive(PartialEq, Eq, Clone, Debug, Serialize, Deserialize)]
pub struct ChannelProposalMsg {
	pub params: Params,
	pub alloc: Allocation,
	pub data: Data,
}

/// Carries one participant's signature on a channel state version.
#[derive(PartialEq, Eq, Clone, Debug, Serialize, Deserialize)]
pub struct SigMsg {
	pub channel: ChannelId,
	pub version: Version,
	pub idx: Idx,
	pub sig: Sig,
}

/// Proposes a state update within an open channel.
#[derive(PartialEq, Eq, Clone, Debug, Serialize, Deserialize)]
pub struct ChannelUpdateMsg {
	pub channel: ChannelId,
	pub state: State,
	pub actor: Idx,
}

/// The messages that flow over a peer connection. The transport framing
/// itself is the connection's concern.
#[derive(PartialEq, Eq, Clone, Debug, Serialize, Deserialize)]
pub enum Msg {
	AuthResponse(AuthResponseMsg),
	Ping(PingMsg),
	ChannelProposal(ChannelProposalMsg),
	Sig(SigMsg),
	ChannelUpdate(ChannelUpdateMsg),
}

/// A connection supporting cancellable send and receive of framed
/// messages. Cancellation is by dropping or timing out the returned
/// future.
#[async_trait]
pub trait Conn: Send {
	async fn send(&mut self, msg: Msg) -> Result<()>;
	async fn recv(&mut self) -> Result<Msg>;
}

fn auth_msg(addr: &Address) -> Vec<u8> {
	let mut msg = AUTH_TAG.to_vec();
	msg.extend_from_slice(addr.bytes());
	msg
}

impl AuthResponseMsg {
	/// Creates the authentication response for the given account, signing
	/// the advertised address under the handshake tag.
	pub fn new(acc: &dyn Account) -> Result<Self> {
		let address = acc.address();
		let sig = acc.sign_data(&auth_msg(&address))?;
		Ok(Self { address, sig })
	}

	/// Verifies the signature against the advertised address.
	pub fn verify(&self, backend: &dyn Backend) -> Result<()> {
		require!(
			backend.verify_signature(&auth_msg(&self.address), &self.sig, &self.address)?,
			Authentication
		);
		Ok(())
	}
}

/// Runs the two-way address exchange on a fresh connection. Sends this
/// account's authentication response, receives exactly one message from the
/// peer, and returns the peer's proven address. A peer opening with
/// anything but an authentication response fails the handshake.
pub async fn exchange_addrs(
	backend: &dyn Backend,
	acc: &dyn Account,
	conn: &mut dyn Conn,
) -> Result<Address> {
	let own = AuthResponseMsg::new(acc)?;
	conn.send(Msg::AuthResponse(own)).await?;
	match conn.recv().await? {
		Msg::AuthResponse(resp) => {
			resp.verify(backend)?;
			debug!("handshake: peer identified as {}", resp.address);
			Ok(resp.address)
		}
		msg => {
			debug!("handshake: unexpected first message {:?}", msg);
			Err(Error::Protocol)
		}
	}
}

/// One end of an in-memory connection, used by tests and the walkthrough.
pub struct PipeConn {
	tx: mpsc::UnboundedSender<Msg>,
	rx: mpsc::UnboundedReceiver<Msg>,
}

/// Creates a pair of connected in-memory connections.
pub fn pipe_conn_pair() -> (PipeConn, PipeConn) {
	let (atx, brx) = mpsc::unbounded_channel();
	let (btx, arx) = mpsc::unbounded_channel();
	(PipeConn { tx: atx, rx: arx }, PipeConn { tx: btx, rx: brx })
}

#[async_trait]
impl Conn for PipeConn {
	async fn send(&mut self, msg: Msg) -> Result<()> {
		self.tx.send(msg).map_err(|_| Error::Connection)
	}

	async fn recv(&mut self) -> Result<Msg> {
		self.rx.recv().await.ok_or(Error::Connection)
	}
}
