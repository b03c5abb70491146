pub mod api;
mod authorization;

pub use api::{ClientRoute, ClientRoutes, CustomOperation, LoginBody, ServerApi};
pub use authorization::{AuthStatus, UserAuthorization};
