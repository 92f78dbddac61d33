use std::collections::BTreeMap;

use crate::{
    credentials::Credentials,
    defaults::SDK_VERSION,
    error::ReclaimError,
    provider::{ProviderData, ProviderDirectory},
    utils::now_millis,
};

use super::{
    validate_url, ContextEntry, Endpoints, ProviderId, RequestFields, SignedRequest,
};

/// An unsigned proof request.
///
/// Every mutator validates its input and leaves the draft untouched when it fails.
/// A draft cannot produce URLs; call [`RequestDraft::finalize`] first.
#[derive(Debug, Clone)]
pub struct RequestDraft {
    fields: RequestFields,
    provider: Option<ProviderData>,
}

impl RequestDraft {
    /// Starts a request for `provider_id` on behalf of the application identified by
    /// `credentials`.
    ///
    /// The provider is resolved through `directory`. The request timestamp is fixed
    /// here and is part of the signed payload.
    ///
    /// # Errors
    /// Returns `UnknownProvider` if the directory cannot resolve the provider, or a
    /// `NetworkError` if the directory could not be reached.
    pub async fn create<D: ProviderDirectory>(
        credentials: &Credentials,
        provider_id: &str,
        directory: &D,
    ) -> Result<Self, ReclaimError> {
        let provider_id = ProviderId::new(provider_id)
            .map_err(|_| ReclaimError::UnknownProvider(provider_id.to_string()))?;
        let provider = directory.resolve(&provider_id).await?;

        log::info!(
            "creating proof request for provider {provider_id} (sdk {SDK_VERSION})"
        );

        Ok(Self {
            fields: RequestFields::new(credentials.app_id(), provider_id, now_millis()),
            provider: Some(provider),
        })
    }

    pub(crate) const fn from_fields(fields: RequestFields) -> Self {
        Self {
            fields,
            provider: None,
        }
    }

    /// Appends a context entry. Order matters: it is part of the signed payload and
    /// of the context the proof must echo.
    ///
    /// # Errors
    /// - `DuplicateContext` if an entry with the same address was already added.
    /// - `InvalidInput` if the address or the message is empty.
    pub fn add_context(&mut self, address: &str, message: &str) -> Result<(), ReclaimError> {
        self.fields.push_context(address, message)
    }

    /// Merges `params` into the request parameters. Last write wins per name.
    ///
    /// # Errors
    /// Returns `InvalidInput` if any name is empty, in which case nothing is applied.
    pub fn set_params<I, K, V>(&mut self, params: I) -> Result<(), ReclaimError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.fields.merge_params(params)?;

        if let Some(provider) = &self.provider {
            let available = provider.available_params();
            for name in self.fields.parameters.keys() {
                if !available.is_empty() && !available.contains(name) {
                    log::warn!(
                        "parameter {name} is not a template variable of provider {}",
                        self.fields.provider_id
                    );
                }
            }
        }
        Ok(())
    }

    /// Sets the page the end user is redirected to after verification.
    ///
    /// # Errors
    /// Returns `InvalidUrl` if `url` is not a well-formed absolute URL.
    pub fn set_redirect_url(&mut self, url: &str) -> Result<(), ReclaimError> {
        self.fields.endpoints.redirect_url = Some(validate_url(url)?);
        Ok(())
    }

    /// Sets the endpoint the network delivers the proof to.
    ///
    /// # Errors
    /// Returns `InvalidUrl` if `url` is not a well-formed absolute URL.
    pub fn set_app_callback_url(&mut self, url: &str) -> Result<(), ReclaimError> {
        self.fields.endpoints.app_callback_url = Some(validate_url(url)?);
        Ok(())
    }

    pub fn set_json_proof_response(&mut self, json_proof_response: bool) {
        self.fields.endpoints.json_proof_response = json_proof_response;
    }

    /// Whether the end user may complete the verification with AI-assisted providers.
    pub fn set_accept_ai_providers(&mut self, accept_ai_providers: bool) {
        self.fields.accept_ai_providers = accept_ai_providers;
    }

    #[must_use]
    pub const fn provider_id(&self) -> &ProviderId {
        &self.fields.provider_id
    }

    /// Provider metadata, when the draft was created through a directory.
    #[must_use]
    pub const fn provider(&self) -> Option<&ProviderData> {
        self.provider.as_ref()
    }

    #[must_use]
    pub fn context(&self) -> &[ContextEntry] {
        &self.fields.context
    }

    #[must_use]
    pub const fn parameters(&self) -> &BTreeMap<String, String> {
        &self.fields.parameters
    }

    #[must_use]
    pub const fn endpoints(&self) -> &Endpoints {
        &self.fields.endpoints
    }

    /// Canonicalizes the draft and signs it.
    ///
    /// Signing is deterministic: finalizing two drafts with identical fields yields
    /// identical signatures.
    ///
    /// # Errors
    /// Returns `InvalidCredentials` if `credentials` belong to another application than
    /// the one the draft was created for, or `Signing` if signing fails.
    pub fn finalize(self, credentials: &Credentials) -> Result<SignedRequest, ReclaimError> {
        if credentials.app_id() != self.fields.app_id {
            return Err(ReclaimError::InvalidCredentials(format!(
                "request belongs to application {}",
                self.fields.app_id.to_checksum(None)
            )));
        }
        let canonical = self.fields.canonical_bytes()?;
        let signature = credentials.sign(&canonical)?;

        log::debug!(
            "finalized proof request for provider {}",
            self.fields.provider_id
        );

        Ok(SignedRequest::from_parts(
            self.fields,
            canonical,
            signature,
            None,
        ))
    }
}
