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
	error::{Error, Result},
	persistence::PersistMachine,
	require,
	types::ChannelId,
};
use log::{debug, trace, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock, Weak};
use tokio::sync::{watch, MutexGuard};

/// A channel controller: the persistence-wrapped machine behind its own
/// exclusive lock, plus a one-shot close signal. The registry owns all
/// controllers; everyone else holds `Arc` handles.
pub struct Channel {
	id: ChannelId,
	machine: tokio::sync::Mutex<PersistMachine>,
	closed: Mutex<bool>,
	closed_tx: watch::Sender<bool>,
	closed_rx: watch::Receiver<bool>,
}

impl Channel {
	pub fn new(machine: PersistMachine) -> Arc<Self> {
		let (closed_tx, closed_rx) = watch::channel(false);
		Arc::new(Self {
			id: machine.id(),
			machine: tokio::sync::Mutex::new(machine),
			closed: Mutex::new(false),
			closed_tx,
			closed_rx,
		})
	}

	pub fn id(&self) -> ChannelId {
		self.id
	}

	/// Locks the channel's machine. All phase transitions, signature
	/// additions, and persistence hooks execute under this lock.
	pub async fn machine(&self) -> MutexGuard<'_, PersistMachine> {
		self.machine.lock().await
	}

	/// Closes the controller. Repeated calls fail with `AlreadyClosed`.
	pub fn close(&self) -> Result<()> {
		let mut closed = self.closed.lock().unwrap();
		require!(!*closed, AlreadyClosed);
		*closed = true;
		let _ = self.closed_tx.send(true);
		debug!("channel {}: controller closed", self.id);
		Ok(())
	}

	pub fn is_closed(&self) -> bool {
		*self.closed.lock().unwrap()
	}

	/// Resolves once the controller has been closed.
	pub async fn closed(&self) {
		let mut rx = self.closed_rx.clone();
		while !*rx.borrow() {
			if rx.changed().await.is_err() {
				return;
			}
		}
	}
}

type NewChannelHandler = Arc<dyn Fn(Arc<Channel>) + Send + Sync>;

struct Inner {
	values: HashMap<ChannelId, Arc<Channel>>,
	new_channel_handler: Option<NewChannelHandler>,
}

/// A registry for channels. Channels can safely be looked up by id and the
/// registry modified concurrently. At most one live controller exists per
/// id at any time.
pub struct Registry {
	inner: RwLock<Inner>,
}

impl Registry {
	pub fn new() -> Arc<Self> {
		Arc::new(Self {
			inner: RwLock::new(Inner {
				values: HashMap::new(),
				new_channel_handler: None,
			}),
		})
	}

	/// Puts a new channel into the registry. If an entry with the same id
	/// already exists, this call does nothing and returns false. Otherwise
	/// it inserts the channel, arranges for the channel's close to
	/// asynchronously remove the entry again, and invokes the new-channel
	/// handler that was visible at insertion time, outside the lock.
	pub fn put(self: &Arc<Self>, ch: Arc<Channel>) -> bool {
		let id = ch.id();
		let handler = {
			let mut inner = self.inner.write().unwrap();
			if inner.values.contains_key(&id) {
				return false;
			}
			inner.values.insert(id, ch.clone());
			inner.new_channel_handler.clone()
		};
		trace!("registry: put channel {}", id);

		let registry = Arc::downgrade(self);
		let watched = ch.clone();
		tokio::spawn(async move {
			watched.closed().await;
			if let Some(r) = Weak::upgrade(&registry) {
				r.delete(id);
			}
		});

		if let Some(handler) = handler {
			handler(ch);
		}
		true
	}

	/// Sets the callback invoked whenever a new channel is added via `put`.
	/// Only one handler can be set at a time; repeated calls overwrite the
	/// previous one. A `put` racing with a replacement delivers to the
	/// handler visible at insertion time, with no stronger guarantee.
	pub fn on_new_channel<F>(&self, handler: F)
	where
		F: Fn(Arc<Channel>) + Send + Sync + 'static,
	{
		let mut inner = self.inner.write().unwrap();
		inner.new_channel_handler = Some(Arc::new(handler));
	}

	/// Whether a channel with the requested id is registered.
	pub fn has(&self, id: ChannelId) -> bool {
		self.inner.read().unwrap().values.contains_key(&id)
	}

	/// Retrieves a channel from the registry.
	pub fn get(&self, id: ChannelId) -> Option<Arc<Channel>> {
		self.inner.read().unwrap().values.get(&id).cloned()
	}

	/// Deletes a channel from the registry. Returns whether the channel
	/// existed.
	pub fn delete(&self, id: ChannelId) -> bool {
		let deleted = self.inner.write().unwrap().values.remove(&id).is_some();
		if deleted {
			trace!("registry: deleted channel {}", id);
		}
		deleted
	}

	pub fn len(&self) -> usize {
		self.inner.read().unwrap().values.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Closes all registered channels. Channels that were already closed
	/// are skipped; of all other errors, the first one is returned and the
	/// remaining channels are still closed. Concurrent `put`s are
	/// serialized by the registry lock.
	pub fn close_all(&self) -> Result<()> {
		let inner = self.inner.write().unwrap();
		let mut first: Option<Error> = None;
		for ch in inner.values.values() {
			match ch.close() {
				Ok(()) | Err(Error::AlreadyClosed) => {}
				Err(err) => {
					if first.is_none() {
						first = Some(err);
					} else {
						warn!("registry: dropping close error on {}: {}", ch.id(), err);
					}
				}
			}
		}
		match first {
			None => Ok(()),
			Some(err) => Err(err),
		}
	}
}
