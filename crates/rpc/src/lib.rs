//! Wire-level types shared by the SpruceKit server and SDK.

pub mod constants;
pub mod error;
pub mod events;
pub mod login;
pub mod recap;
pub mod session;
pub mod siwe;

pub use error::MessageError;
pub use events::{EventType, LogEvent, LoginEventContent, did_pkh};
pub use login::{LoginRequest, LogoutResponse, MessageResponse, SiweInput, UnauthorizedResponse};
pub use recap::Recap;
pub use session::{
    ClientSession, EnsData, EnsResolveOptions, LensPageInfo, LensProfile, LensProfilesResponse,
    LensResolution, ResolveEns, ServerSession,
};
pub use siwe::SiweMessage;
