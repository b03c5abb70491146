pub const DEFAULT_NONCE_PATH: &str = "/sprucekit-nonce";
pub const DEFAULT_LOGIN_PATH: &str = "/sprucekit-login";
pub const DEFAULT_LOGOUT_PATH: &str = "/sprucekit-logout";

pub const DEFAULT_COOKIE_NAME: &str = "sprucekit-session-storage";
pub const DEFAULT_METRICS_URL: &str = "https://api.sprucekit.id";

/// Namespace registered by the delegation extension; its presence turns on DAO login.
pub const DELEGATION_NAMESPACE: &str = "delegationRegistry";

pub const SIWE_VERSION: &str = "1";
