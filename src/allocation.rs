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
	encoding::{put_u32, Decode, Encode, Reader},
	error::{Error, Result},
	require,
	types::ChannelId,
};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

/// An amount of an asset. Unbounded and non-negative.
pub type Bal = BigUint;

/// Funds escrowed to a sub-channel, carried as an opaque identifier plus one
/// balance per asset.
#[derive(PartialEq, Eq, Clone, Debug, Serialize, Deserialize)]
pub struct SubAlloc {
	/// The sub-channel these funds are locked to.
	pub id: ChannelId,
	/// The locked funds, one balance per channel asset.
	pub bals: Vec<Bal>,
}

/// A channel's asset allocation: one balance row per participant, one column
/// per asset, plus the locked sub-allocations. Sub-allocations are never
/// mutated in place; updates replace the whole allocation.
#[derive(PartialEq, Eq, Clone, Debug, Default, Serialize, Deserialize)]
pub struct Allocation {
	pub of_parts: Vec<Vec<Bal>>,
	pub locked: Vec<SubAlloc>,
}

impl SubAlloc {
	pub fn new(id: ChannelId, bals: Vec<Bal>) -> Self {
		Self { id, bals }
	}
}

impl Allocation {
	pub fn new(of_parts: Vec<Vec<Bal>>) -> Self {
		Self {
			of_parts,
			locked: Vec::new(),
		}
	}

	pub fn num_parts(&self) -> usize {
		self.of_parts.len()
	}

	/// The number of assets. Only meaningful on a valid allocation.
	pub fn num_assets(&self) -> usize {
		self.of_parts.first().map_or(0, Vec::len)
	}

	/// Checks that the allocation is rectangular: at least one participant
	/// row, at least one asset column, all rows and all locked vectors of
	/// the same length. Never panics.
	pub fn valid(&self) -> bool {
		let n = match self.of_parts.first() {
			Some(row) => row.len(),
			None => return false,
		};
		if n == 0 {
			return false;
		}
		self.of_parts.iter().all(|row| row.len() == n)
			&& self.locked.iter().all(|l| l.bals.len() == n)
	}

	/// Sums all participant rows and locked vectors per asset. Callers must
	/// check `valid()` first; an invalid allocation panics.
	pub fn sum(&self) -> Vec<Bal> {
		assert!(self.valid(), "sum of invalid allocation");
		let mut acc = vec![Bal::default(); self.num_assets()];
		for row in &self.of_parts {
			for (a, bal) in row.iter().enumerate() {
				acc[a] += bal;
			}
		}
		for l in &self.locked {
			for (a, bal) in l.bals.iter().enumerate() {
				acc[a] += bal;
			}
		}
		acc
	}
}

/// Compares two per-asset totals. Totals of different arity are
/// incomparable and yield an error rather than a boolean.
pub fn equal_sum(a: &[Bal], b: &[Bal]) -> Result<bool> {
	require!(a.len() == b.len(), Dimension);
	Ok(a == b)
}

fn put_bal(w: &mut Vec<u8>, b: &Bal) {
	crate::encoding::put_bytes(w, &b.to_bytes_be());
}

fn get_bal(r: &mut Reader) -> Result<Bal> {
	Ok(Bal::from_bytes_be(&r.bytes()?))
}

fn put_bals(w: &mut Vec<u8>, bals: &[Bal]) {
	put_u32(w, bals.len() as u32);
	for b in bals {
		put_bal(w, b);
	}
}

fn get_bals(r: &mut Reader) -> Result<Vec<Bal>> {
	let n = r.u32()? as usize;
	let mut bals = Vec::with_capacity(n);
	for _ in 0..n {
		bals.push(get_bal(r)?);
	}
	Ok(bals)
}

impl Encode for Allocation {
	fn encode(&self, w: &mut Vec<u8>) {
		put_u32(w, self.of_parts.len() as u32);
		for row in &self.of_parts {
			put_bals(w, row);
		}
		put_u32(w, self.locked.len() as u32);
		for l in &self.locked {
			l.id.encode(w);
			put_bals(w, &l.bals);
		}
	}
}

impl Decode for Allocation {
	fn decode(r: &mut Reader) -> Result<Self> {
		let rows = r.u32()? as usize;
		let mut of_parts = Vec::with_capacity(rows);
		for _ in 0..rows {
			of_parts.push(get_bals(r)?);
		}
		let nlocked = r.u32()? as usize;
		let mut locked = Vec::with_capacity(nlocked);
		for _ in 0..nlocked {
			let id = ChannelId::decode(r)?;
			locked.push(SubAlloc::new(id, get_bals(r)?));
		}
		Ok(Allocation { of_parts, locked })
	}
}
