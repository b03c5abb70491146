use alloy_primitives::Address;
use blockchain::{resolve_ens, resolve_lens};
use chrono::Utc;
use log::{error, info, warn};
use rpc::{
    EnsData, EnsResolveOptions, LensResolution, LogEvent, LoginEventContent, LoginRequest,
    ServerSession, SiweInput, did_pkh,
};

use crate::auth::{VerifiedMessage, verify_siwe_message};
use crate::error::{ServiceError, ServiceResult};
use crate::persist::SessionRecord;
use crate::service::{ServerEvent, SpruceKitService};

pub const MISSING_SIGNATURE: &str = "Expected the field `signature` in body.";
pub const MISSING_SIWE: &str = "Expected the field `siwe` in the body.";

#[derive(Clone, Debug)]
pub struct LoginParams {
    pub siwe: SiweInput,
    pub signature: String,
    pub dao_login: bool,
    pub resolve_ens: Option<EnsResolveOptions>,
    pub resolve_lens: bool,
}

impl TryFrom<LoginRequest> for LoginParams {
    type Error = ServiceError;

    fn try_from(req: LoginRequest) -> Result<Self, Self::Error> {
        let signature = req
            .signature
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ServiceError::InvalidParams(MISSING_SIGNATURE.into()))?;
        let siwe = req
            .siwe
            .ok_or_else(|| ServiceError::InvalidParams(MISSING_SIWE.into()))?;
        Ok(Self {
            siwe,
            signature,
            dao_login: req.dao_login,
            resolve_ens: req.resolve_ens.and_then(|r| r.requested()),
            resolve_lens: req.resolve_lens.unwrap_or(false),
        })
    }
}

fn short(signature: &str) -> &str {
    signature.get(..10).unwrap_or(signature)
}

impl SpruceKitService {
    /// Verify a login against `nonce` and build the session record.
    ///
    /// Verification and the requested ENS/Lens lookups run concurrently. The
    /// lookups never fail the login; a failed lookup just leaves its field
    /// empty.
    pub async fn login(
        &self,
        params: LoginParams,
        nonce: Option<&str>,
    ) -> ServiceResult<ServerSession> {
        let nonce = nonce.ok_or(ServiceError::InvalidNonce)?;
        let message = params.siwe.into_message()?;
        let address = message.address;
        let fallback = self.fallback_for(params.dao_login);

        let (verified, ens, lens) = tokio::join!(
            verify_siwe_message(
                &message,
                &params.signature,
                Some(nonce),
                fallback.as_deref(),
                Utc::now()
            ),
            self.resolve_ens(address, params.resolve_ens),
            self.resolve_lens(address, params.resolve_lens),
        );
        let verified = match verified {
            Ok(verified) => verified,
            Err(err) => {
                warn!("login for {address} rejected: {err}");
                return Err(err);
            }
        };

        let session = ServerSession {
            siwe: verified.message.clone(),
            signature: params.signature,
            dao_login: params.dao_login,
            ens,
            lens,
            verified: true,
        };
        self.record_login(&session, &verified);
        Ok(session)
    }

    /// Login bound to a stored session: the pending nonce is consumed before
    /// verification, whatever the outcome.
    pub async fn login_session(
        &self,
        session_id: &str,
        params: LoginParams,
    ) -> ServiceResult<ServerSession> {
        let nonce = self.inner.store.take_nonce(session_id).await?;
        let session = match self.login(params, nonce.as_deref()).await {
            Ok(session) => session,
            Err(err) => {
                self.inner.store.destroy(session_id).await?;
                return Err(err);
            }
        };

        self.inner
            .store
            .save(
                session_id,
                SessionRecord {
                    nonce: None,
                    session: Some(session.clone()),
                },
            )
            .await?;
        info!(
            "signed in {} (signature {}...)",
            did_pkh(session.siwe.chain_id, &session.siwe.address),
            short(&session.signature)
        );
        Ok(session)
    }

    /// Check an established session again, against the nonce it was bound to.
    pub async fn reverify(&self, session: &ServerSession) -> ServiceResult<VerifiedMessage> {
        let fallback = self.fallback_for(session.dao_login);
        verify_siwe_message(
            &session.siwe,
            &session.signature,
            Some(session.siwe.nonce.as_str()),
            fallback.as_deref(),
            Utc::now(),
        )
        .await
    }

    pub async fn resolve_ens(
        &self,
        address: Address,
        options: Option<EnsResolveOptions>,
    ) -> Option<EnsData> {
        let options = options?;
        let Some(resolver) = &self.inner.resolver else {
            warn!("ENS resolution requested but no chain provider is configured");
            return None;
        };
        match resolve_ens(resolver.as_ref(), address, options).await {
            Ok(ens) => Some(ens),
            Err(err) => {
                warn!("ENS resolution for {address} failed: {err}");
                None
            }
        }
    }

    pub async fn resolve_lens(&self, address: Address, requested: bool) -> Option<LensResolution> {
        if !requested {
            return None;
        }
        let Some(resolver) = &self.inner.resolver else {
            warn!("Lens resolution requested but no chain provider is configured");
            return None;
        };
        match resolve_lens(&self.inner.lens, resolver.as_ref(), address).await {
            Ok(lens) => Some(lens),
            Err(err) => {
                warn!("Lens resolution for {address} failed: {err}");
                None
            }
        }
    }

    fn record_login(&self, session: &ServerSession, verified: &VerifiedMessage) {
        // Only a label for the log: raw recovery failing under DAO login does
        // not prove the address is a contract wallet.
        let is_gnosis = session.dao_login && verified.recovered != Some(session.siwe.address);
        let content = LoginEventContent {
            signature: session.signature.clone(),
            siwe: session.siwe.clone(),
            is_gnosis,
        };
        let event = match LogEvent::login(&content) {
            Ok(event) => event,
            Err(err) => {
                error!("failed to build login event: {err}");
                return;
            }
        };

        if let Some(sink) = &self.inner.log_sink {
            sink.dispatch(event.clone());
        }
        let event = ServerEvent::Login(event);
        for observer in &self.inner.observers {
            observer(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpc::ResolveEns;

    #[test]
    fn missing_signature_is_reported_first() {
        let err = LoginParams::try_from(LoginRequest::default()).unwrap_err();
        match err {
            ServiceError::InvalidParams(msg) => assert_eq!(msg, MISSING_SIGNATURE),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn missing_siwe_is_reported() {
        let req = LoginRequest {
            signature: Some("0x00".into()),
            ..Default::default()
        };
        match LoginParams::try_from(req).unwrap_err() {
            ServiceError::InvalidParams(msg) => assert_eq!(msg, MISSING_SIWE),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn resolve_flags_are_normalised() {
        let req = LoginRequest {
            signature: Some("0x00".into()),
            siwe: Some(SiweInput::Text("x".into())),
            resolve_ens: Some(ResolveEns::Flag(true)),
            resolve_lens: None,
            dao_login: false,
        };
        let params = LoginParams::try_from(req).unwrap();
        assert_eq!(params.resolve_ens, Some(EnsResolveOptions::ALL));
        assert!(!params.resolve_lens);
    }

    #[test]
    fn short_signature_prefix() {
        assert_eq!(short("0x0123456789abcdef"), "0x01234567");
        assert_eq!(short("0x01"), "0x01");
    }
}
