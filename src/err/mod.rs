use thiserror::Error;
use uuid::Uuid;

/// An error originating from the TesseraDB core library.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
	/// There was a problem with a channel used for message delivery
	#[error("There was a problem with a channel: {0}")]
	Channel(String),

	/// The message bus could not deliver a message before the timeout
	#[error("Timed out sending a message to node '{node}'")]
	SendTimeout {
		node: Uuid,
	},

	/// An overflow cursor could not be closed cleanly
	#[error("There was a problem closing an overflow cursor: {0}")]
	IteratorClose(String),

	/// There was an unexpected error within the engine
	#[error("There was an unexpected error: {0}")]
	Internal(String),
}
