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
	encoding::{put_bytes, Decode, Encode, Reader},
	error::Result,
};
use serde::{Deserialize, Serialize};

/// A signature over protocol messages, in the canonical byte representation
/// of the producing wallet backend.
#[derive(PartialEq, Eq, Clone, Debug, Serialize, Deserialize)]
pub struct Sig(#[serde(with = "serde_bytes")] pub Vec<u8>);

/// A participant identity in its canonical byte representation. The byte
/// form is backend-defined; the core only relies on equality, hashing, and
/// the canonical encoding.
#[derive(PartialEq, Eq, Hash, Clone, Debug, Serialize, Deserialize)]
pub struct Address(#[serde(with = "serde_bytes")] pub Vec<u8>);

/// An embeddable, comparable map-key representation of an [`Address`].
/// `a.key() == b.key()` exactly when `a == b`, and `key.addr()` restores the
/// original address.
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct AddrKey(Vec<u8>);

/// The signing and verification backend the core is parameterized over.
/// Implementations decode their own address and signature formats and
/// verify signatures in constant time. Verification reports a malformed or
/// mismatching signature as `Ok(false)` and must never panic.
pub trait Backend: Send + Sync {
	fn decode_address(&self, r: &mut Reader) -> Result<Address>;
	fn decode_sig(&self, r: &mut Reader) -> Result<Sig>;
	fn verify_signature(&self, msg: &[u8], sig: &Sig, addr: &Address) -> Result<bool>;
}

/// An unlocked account, able to sign protocol messages. Signatures over the
/// same message need not be bit-identical, but must have constant length
/// per account.
pub trait Account: Send + Sync {
	fn address(&self) -> Address;
	fn sign_data(&self, msg: &[u8]) -> Result<Sig>;
}

impl Address {
	pub fn bytes(&self) -> &[u8] {
		&self.0
	}

	pub fn key(&self) -> AddrKey {
		AddrKey(self.0.clone())
	}
}

impl std::fmt::Display for Address {
	/// Formats the full address as lower case hex with 0x prefix. The
	/// rendering is non-empty and distinct for distinct addresses.
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "0x{}", hex::encode(&self.0))
	}
}

impl Encode for Address {
	fn encode(&self, w: &mut Vec<u8>) {
		put_bytes(w, &self.0);
	}
}

impl Decode for Address {
	fn decode(r: &mut Reader) -> Result<Self> {
		Ok(Address(r.bytes()?))
	}
}

impl AddrKey {
	pub fn addr(&self) -> Address {
		Address(self.0.clone())
	}
}

impl From<&Address> for AddrKey {
	fn from(a: &Address) -> Self {
		a.key()
	}
}

impl Sig {
	pub fn bytes(&self) -> &[u8] {
		&self.0
	}
}

impl Encode for Sig {
	fn encode(&self, w: &mut Vec<u8>) {
		put_bytes(w, &self.0);
	}
}

impl Decode for Sig {
	fn decode(r: &mut Reader) -> Result<Self> {
		Ok(Sig(r.bytes()?))
	}
}
