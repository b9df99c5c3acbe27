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
	encoding::Reader,
	error::{Error, Result},
	wallet::{Account, Address, Backend, Sig},
};
use core::convert::TryFrom;
use ed25519_dalek::{ExpandedSecretKey, PublicKey, SecretKey, Signature};
use oorandom::Rand64 as Prng;
use std::sync::Arc;

/// Simulation wallet backend over ed25519. Addresses are the 32-byte public
/// keys, signatures the 64-byte detached signatures.
pub struct SimBackend;

impl Backend for SimBackend {
	fn decode_address(&self, r: &mut Reader) -> Result<Address> {
		let bytes = r.bytes()?;
		PublicKey::from_bytes(&bytes)
			.ok()
			.ok_or(Error::InvalidInput)?;
		Ok(Address(bytes))
	}

	fn decode_sig(&self, r: &mut Reader) -> Result<Sig> {
		let bytes = r.bytes()?;
		Signature::try_from(bytes.as_slice())
			.ok()
			.ok_or(Error::InvalidInput)?;
		Ok(Sig(bytes))
	}

	fn verify_signature(&self, msg: &[u8], sig: &Sig, addr: &Address) -> Result<bool> {
		let pk = PublicKey::from_bytes(addr.bytes())
			.ok()
			.ok_or(Error::InvalidInput)?;
		let sig = match Signature::try_from(sig.bytes()) {
			Ok(sig) => sig,
			Err(_) => return Ok(false),
		};
		Ok(pk.verify_strict(msg, &sig).is_ok())
	}
}

/// An unlocked simulation account holding an expanded ed25519 secret key.
pub struct SimAccount {
	public: PublicKey,
	secret: ExpandedSecretKey,
}

impl SimAccount {
	/// Generates an account from a randomness source.
	pub fn new_random(rand: &mut Prng) -> Self {
		let mut bytes: [u8; 32] = Default::default();
		for i in 0..bytes.len() {
			bytes[i] = (rand.rand_u64() & 255) as u8;
		}
		let sk = SecretKey::from_bytes(&bytes).unwrap();
		let secret = ExpandedSecretKey::from(&sk);
		let public = (&sk).into();
		Self { public, secret }
	}
}

impl Account for SimAccount {
	fn address(&self) -> Address {
		Address(self.public.to_bytes().to_vec())
	}

	fn sign_data(&self, msg: &[u8]) -> Result<Sig> {
		Ok(Sig(self.secret.sign(msg, &self.public).to_bytes().to_vec()))
	}
}

/// Generates `n` random accounts along with their addresses.
pub fn new_random_accounts(rand: &mut Prng, n: usize) -> (Vec<Arc<SimAccount>>, Vec<Address>) {
	let accs: Vec<_> = (0..n).map(|_| Arc::new(SimAccount::new_random(rand))).collect();
	let addrs = accs.iter().map(|a| a.address()).collect();
	(accs, addrs)
}
