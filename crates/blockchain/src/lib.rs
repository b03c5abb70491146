//! Chain-facing collaborators used around login: name service and profile
//! resolution, delegate checks and contract wallet signatures.

pub mod chain;
pub mod ens;
pub mod error;
pub mod lens;
pub mod resolver;

pub use chain::ChainClient;
pub use ens::resolve_ens;
pub use error::{ResolutionError, Result};
pub use lens::{LensClient, resolve_lens};
pub use resolver::{AddressResolver, ContractSignatureVerifier, DelegateOracle, Network};
