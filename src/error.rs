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

#[macro_export]
macro_rules! require {
	($cond:expr, $err:ident) => {
		if !($cond) {
			return Err(Error::$err);
		}
	};
	($cond:expr, $err:expr) => {
		if !($cond) {
			return Err($err);
		}
	};
}

#[derive(PartialEq, Eq, Clone, Debug)]
/// Contains all errors that can occur during an operation on the channel
/// protocol core.
pub enum Error {
	/// The requested operation is not legal in the channel's current phase.
	Phase,
	/// A state transition violates version monotonicity, changes the channel
	/// identifier, or leaves a final state.
	Version,
	/// An allocation is malformed or a transition does not conserve the
	/// per-asset totals.
	Allocation,
	/// Two balance vectors of different arity were compared.
	Dimension,
	/// A signature failed to verify against the staged state, or a signature
	/// slot is already occupied with a different value.
	Signature,
	/// Any kind of identity or handshake signature mismatch.
	Authentication,
	/// An unexpected message was received during the handshake.
	Protocol,
	/// The connection failed before the operation completed.
	Connection,
	/// The operation was cancelled before it could complete.
	Cancelled,
	/// A channel controller was closed more than once.
	AlreadyClosed,
	/// A persistence hook failed. The payload names the failed hook.
	Persistence(String),
	/// In some way, the input was invalid.
	InvalidInput,
	/// A non-settled channel was withdrawn from, or a non-finalized state was
	/// registered where a finalized one was expected.
	NotFinalized,
	/// A channel has been concluded or disputed after conclusion.
	AlreadyConcluded,
	/// When trying to get more funds out of a channel than have been put
	/// into it.
	InsufficientFunding,
	/// When a registered or withdrawn state is older than the previously
	/// registered state.
	OutdatedState,
	/// The requested channel is not known to the receiver.
	UnknownChannel,
}

impl std::fmt::Display for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		std::fmt::Debug::fmt(self, f)
	}
}

impl std::error::Error for Error {}

/// Protocol operation result type.
pub type Result<T> = core::result::Result<T, Error>;
