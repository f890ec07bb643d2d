pub use error::{FrameError, ProtocolError};
pub use message::{LobbyMessage, Message};

pub mod connection;
mod error;
mod message;
