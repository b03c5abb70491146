use std::fmt;
use std::str::FromStr;

use alloy_primitives::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::SIWE_VERSION;
use crate::error::{MessageError, invalid_siwe};

pub const SIWE_HEADER_SUFFIX: &str = " wants you to sign in with your Ethereum account:";
const RESOURCES_HEADER: &str = "Resources:";

/// An EIP-4361 message. The signature covers the exact text produced by the
/// `Display` impl, so field order and line layout are fixed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiweMessage {
    pub domain: String,
    #[serde(with = "checksummed")]
    pub address: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement: Option<String>,
    pub uri: String,
    pub version: String,
    pub chain_id: u64,
    pub nonce: String,
    pub issued_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<String>,
}

impl SiweMessage {
    /// Canonical text of the message, the exact bytes a wallet signs.
    pub fn prepare_message(&self) -> String {
        self.to_string()
    }

    /// Parse the canonical text form and check it is well formed.
    pub fn parse(raw: &str) -> Result<Self, MessageError> {
        let message = parse_siwe_message(raw)?;
        message.validate()?;
        Ok(message)
    }

    /// Structural checks that do not depend on the current time.
    pub fn validate(&self) -> Result<(), MessageError> {
        if self.domain.trim().is_empty() || self.domain.contains(char::is_whitespace) {
            return Err(invalid_siwe("invalid domain"));
        }
        if self.uri.trim().is_empty() {
            return Err(invalid_siwe("missing uri"));
        }
        if self.version != SIWE_VERSION {
            return Err(invalid_siwe(format!(
                "unsupported version {}",
                self.version
            )));
        }
        if self.chain_id == 0 {
            return Err(invalid_siwe("chain id must be positive"));
        }
        if self.nonce.len() < 8 || !self.nonce.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(invalid_siwe("nonce must be at least 8 alphanumeric characters"));
        }
        if let Some(statement) = &self.statement
            && statement.contains('\n')
        {
            return Err(invalid_siwe("statement must be a single line"));
        }
        if self.resources.iter().any(|r| r.trim().is_empty()) {
            return Err(invalid_siwe("empty resource"));
        }

        let issued_at = self.issued_at_time()?;
        if let Some(expiration) = self.expiration()?
            && expiration <= issued_at
        {
            return Err(invalid_siwe("expiration time must be after issued at"));
        }
        self.not_before_time()?;
        Ok(())
    }

    pub fn issued_at_time(&self) -> Result<DateTime<Utc>, MessageError> {
        parse_rfc3339("issued_at", &self.issued_at)
    }

    pub fn expiration(&self) -> Result<Option<DateTime<Utc>>, MessageError> {
        self.expiration_time
            .as_deref()
            .map(|raw| parse_rfc3339("expiration_time", raw))
            .transpose()
    }

    pub fn not_before_time(&self) -> Result<Option<DateTime<Utc>>, MessageError> {
        self.not_before
            .as_deref()
            .map(|raw| parse_rfc3339("not_before", raw))
            .transpose()
    }
}

impl fmt::Display for SiweMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}\n{}\n\n",
            self.domain,
            SIWE_HEADER_SUFFIX,
            self.address.to_checksum(None)
        )?;
        if let Some(statement) = &self.statement {
            writeln!(f, "{statement}")?;
        }
        write!(
            f,
            "\nURI: {}\nVersion: {}\nChain ID: {}\nNonce: {}\nIssued At: {}",
            self.uri, self.version, self.chain_id, self.nonce, self.issued_at
        )?;
        if let Some(expiration) = &self.expiration_time {
            write!(f, "\nExpiration Time: {expiration}")?;
        }
        if let Some(not_before) = &self.not_before {
            write!(f, "\nNot Before: {not_before}")?;
        }
        if let Some(request_id) = &self.request_id {
            write!(f, "\nRequest ID: {request_id}")?;
        }
        if !self.resources.is_empty() {
            write!(f, "\n{RESOURCES_HEADER}")?;
            for resource in &self.resources {
                write!(f, "\n- {resource}")?;
            }
        }
        Ok(())
    }
}

impl FromStr for SiweMessage {
    type Err = MessageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

pub fn parse_rfc3339(label: &'static str, raw: &str) -> Result<DateTime<Utc>, MessageError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| MessageError::InvalidTimestamp {
            field: label,
            value: raw.to_string(),
        })
}

fn parse_siwe_message(raw: &str) -> Result<SiweMessage, MessageError> {
    let lines: Vec<&str> = raw.lines().collect();
    if lines.len() < 2 {
        return Err(invalid_siwe("message must include header and address"));
    }

    let domain = lines[0]
        .strip_suffix(SIWE_HEADER_SUFFIX)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| invalid_siwe("invalid header line"))?
        .to_string();

    let address_line = lines[1].trim();
    let address =
        Address::from_str(address_line).map_err(|_| invalid_siwe("invalid address in message"))?;
    if address.to_checksum(None) != address_line {
        return Err(invalid_siwe("address is not EIP-55 checksummed"));
    }

    let mut index = 2;
    if index < lines.len() && lines[index].is_empty() {
        index += 1;
    }

    let mut statement = None;
    if index < lines.len() {
        let candidate = lines[index];
        if !candidate.is_empty() && !candidate.starts_with("URI:") {
            statement = Some(candidate.to_string());
            index += 1;
        }
    }

    let mut uri = None;
    let mut version = None;
    let mut chain_id = None;
    let mut nonce = None;
    let mut issued_at = None;
    let mut expiration_time = None;
    let mut not_before = None;
    let mut request_id = None;
    let mut resources = Vec::new();

    let mut i = index;
    while i < lines.len() {
        let line = lines[i];
        if line.is_empty() {
            i += 1;
            continue;
        }

        if line == RESOURCES_HEADER {
            i += 1;
            while i < lines.len() {
                match lines[i].strip_prefix("- ") {
                    Some(resource) => {
                        resources.push(resource.to_string());
                        i += 1;
                    }
                    None => return Err(invalid_siwe("unexpected line after resources")),
                }
            }
            break;
        }

        if let Some(value) = parse_field(line, "URI:") {
            uri = Some(value.to_string());
        } else if let Some(value) = parse_field(line, "Version:") {
            version = Some(value.to_string());
        } else if let Some(value) = parse_field(line, "Chain ID:") {
            chain_id = Some(
                value
                    .parse::<u64>()
                    .map_err(|_| invalid_siwe("invalid chain id"))?,
            );
        } else if let Some(value) = parse_field(line, "Nonce:") {
            nonce = Some(value.to_string());
        } else if let Some(value) = parse_field(line, "Issued At:") {
            issued_at = Some(value.to_string());
        } else if let Some(value) = parse_field(line, "Expiration Time:") {
            expiration_time = Some(value.to_string());
        } else if let Some(value) = parse_field(line, "Not Before:") {
            not_before = Some(value.to_string());
        } else if let Some(value) = parse_field(line, "Request ID:") {
            request_id = Some(value.to_string());
        } else {
            return Err(invalid_siwe(format!("unknown field line: {line}")));
        }
        i += 1;
    }

    Ok(SiweMessage {
        domain,
        address,
        statement,
        uri: uri.ok_or_else(|| invalid_siwe("missing uri"))?,
        version: version.ok_or_else(|| invalid_siwe("missing version"))?,
        chain_id: chain_id.ok_or_else(|| invalid_siwe("missing chain id"))?,
        nonce: nonce.ok_or_else(|| invalid_siwe("missing nonce"))?,
        issued_at: issued_at.ok_or_else(|| invalid_siwe("missing issued_at"))?,
        expiration_time,
        not_before,
        request_id,
        resources,
    })
}

fn parse_field<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    line.strip_prefix(key).map(str::trim)
}

pub mod checksummed {
    use std::str::FromStr;

    use alloy_primitives::Address;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(address: &Address, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&address.to_checksum(None))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Address, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Address::from_str(raw.trim()).map_err(D::Error::custom)
    }
}
