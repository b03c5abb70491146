use std::str::FromStr;

use alloy::primitives::Address;
use url::Url;

pub fn validate_url(url: &str) -> anyhow::Result<Url> {
    Url::parse(url).map_err(|e| anyhow::anyhow!("invalid URL: {}", e))
}

pub fn validate_address(address: &str) -> anyhow::Result<Address> {
    Address::from_str(address.trim()).map_err(|e| anyhow::anyhow!("invalid address: {}", e))
}

pub fn validate_chain_id(chain_id: &str) -> anyhow::Result<u64> {
    match chain_id.trim().parse::<u64>() {
        Ok(0) => anyhow::bail!("invalid chain id: must be positive"),
        Ok(id) => Ok(id),
        Err(e) => anyhow::bail!("invalid chain id: {}", e),
    }
}

/// An RFC 3986 authority as it appears in the SIWE header: no scheme, no
/// path, no whitespace.
pub fn validate_domain(domain: &str) -> anyhow::Result<String> {
    let domain = domain.trim();
    if domain.is_empty() || domain.contains(char::is_whitespace) {
        anyhow::bail!("invalid domain: '{}'", domain);
    }
    if domain.contains("://") || domain.contains('/') {
        anyhow::bail!("invalid domain: '{}' must not contain a scheme or path", domain);
    }
    Ok(domain.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_id_must_be_positive() {
        assert_eq!(validate_chain_id("137").unwrap(), 137);
        assert!(validate_chain_id("0").is_err());
        assert!(validate_chain_id("mainnet").is_err());
    }

    #[test]
    fn domain_is_an_authority() {
        assert_eq!(validate_domain(" localhost:3000 ").unwrap(), "localhost:3000");
        assert!(validate_domain("https://example.com").is_err());
        assert!(validate_domain("example.com/login").is_err());
        assert!(validate_domain("").is_err());
    }
}
