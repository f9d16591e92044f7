//! Connection management: transport, framing, and the session engine.

mod framed;
mod session;
mod stream;

pub use framed::LineStream;
pub use session::{CommandResponse, ImapSession, SessionConfig, Status};
pub use stream::{ImapStream, connect, create_tls_connector};
