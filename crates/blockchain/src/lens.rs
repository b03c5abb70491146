use alloy_primitives::Address;
use log::debug;
use rpc::{LensProfilesResponse, LensResolution};
use serde::Deserialize;
use serde_json::json;

use crate::error::{ResolutionError, Result};
use crate::resolver::{AddressResolver, Network};

pub const LENS_API_MATIC: &str = "https://api.lens.dev";
pub const LENS_API_MUMBAI: &str = "https://api-mumbai.lens.dev";

const PROFILES_QUERY: &str = r#"query Profiles($addresses: [EthereumAddress!], $cursor: Cursor) {
  profiles(request: { ownedBy: $addresses, limit: 10, cursor: $cursor }) {
    items {
      id
      name
      bio
      attributes { displayType traitType key value }
      followNftAddress
      metadata
      isDefault
      picture {
        ... on NftImage { contractAddress tokenId uri verified }
        ... on MediaSet { original { url mimeType } }
      }
      handle
      coverPicture {
        ... on NftImage { contractAddress tokenId uri verified }
        ... on MediaSet { original { url mimeType } }
      }
      ownedBy
      dispatcher { address canUseRelay }
      stats {
        totalFollowers totalFollowing totalPosts totalComments
        totalMirrors totalPublications totalCollects
      }
      followModule { __typename }
    }
    pageInfo { prev next totalCount }
  }
}"#;

pub fn lens_api_url(network: &str) -> Option<&'static str> {
    match network {
        "matic" => Some(LENS_API_MATIC),
        "matic-mumbai" => Some(LENS_API_MUMBAI),
        _ => None,
    }
}

pub fn unsupported_network_message(address: &Address, network: &str) -> String {
    format!(
        "Can't resolve Lens to {} on network '{network}'. Use 'matic' (Polygon) or 'matic-mumbai' (Mumbai) instead.",
        address.to_checksum(None)
    )
}

#[derive(Deserialize)]
struct GraphQlResponse {
    data: Option<ProfilesData>,
    #[serde(default)]
    errors: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct ProfilesData {
    profiles: LensProfilesResponse,
}

/// Lens profile lookups over the public GraphQL API.
#[derive(Clone, Debug)]
pub struct LensClient {
    http: reqwest::Client,
    endpoint_override: Option<String>,
}

impl Default for LensClient {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

impl LensClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            endpoint_override: None,
        }
    }

    /// Send every query to `endpoint` regardless of network.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint_override = Some(endpoint.into());
        self
    }

    /// Profiles owned by `address`, ten per page. Unsupported networks are
    /// reported in the returned value, not as an error.
    pub async fn resolve(
        &self,
        network: &Network,
        address: Address,
        cursor: Option<&str>,
    ) -> Result<LensResolution> {
        if address.is_zero() {
            return Err(ResolutionError::MissingAddress);
        }
        let Some(default_url) = lens_api_url(&network.name) else {
            return Ok(LensResolution::Unavailable(unsupported_network_message(
                &address,
                &network.name,
            )));
        };
        let url = self.endpoint_override.as_deref().unwrap_or(default_url);

        let body = json!({
            "operationName": "Profiles",
            "query": PROFILES_QUERY,
            "variables": {
                "addresses": [address.to_checksum(None)],
                "cursor": cursor.unwrap_or("{}"),
            },
        });
        debug!("querying Lens profiles for {address} at {url}");

        let response: GraphQlResponse = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match response.data {
            Some(data) => Ok(LensResolution::Profiles(data.profiles)),
            None => Err(ResolutionError::Decode(
                response
                    .errors
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "empty Lens response".into()),
            )),
        }
    }
}

/// Look up the resolver's network first and query Lens on it.
pub async fn resolve_lens(
    client: &LensClient,
    resolver: &dyn AddressResolver,
    address: Address,
) -> Result<LensResolution> {
    let network = resolver.get_network().await?;
    client.resolve(&network, address, None).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_by_network() {
        assert_eq!(lens_api_url("matic"), Some(LENS_API_MATIC));
        assert_eq!(lens_api_url("matic-mumbai"), Some(LENS_API_MUMBAI));
        assert_eq!(lens_api_url("homestead"), None);
    }

    #[test_log::test(tokio::test)]
    async fn unsupported_network_yields_message() {
        let client = LensClient::default();
        let address = Address::repeat_byte(0x11);
        let result = client
            .resolve(&Network::from_chain_id(1), address, None)
            .await
            .unwrap();

        assert_eq!(
            result,
            LensResolution::Unavailable(format!(
                "Can't resolve Lens to {} on network 'homestead'. Use 'matic' (Polygon) or 'matic-mumbai' (Mumbai) instead.",
                address.to_checksum(None)
            ))
        );
    }
}
