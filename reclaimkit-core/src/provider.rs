//! Provider metadata and the directory resolving provider references.

use std::{collections::HashMap, future::Future};

use serde::{Deserialize, Serialize};

use crate::{error::ReclaimError, request::ProviderId};

/// A rule selecting the part of the provider's response that backs the claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSelection {
    /// Pattern the response must (or must not, see `invert`) match. May contain
    /// `{{name}}` template variables.
    pub response_match: String,
    /// Whether the match is negated.
    #[serde(default)]
    pub invert: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BodySniff {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

/// Template metadata of a provider, as published by the provider directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderData {
    /// Id of the provider. Matches the provider reference it was resolved from.
    pub http_provider_id: String,
    #[serde(default)]
    pub name: String,
    /// URL the attestor fetches. May contain `{{name}}` template variables.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub login_url: String,
    #[serde(default)]
    pub response_selections: Vec<ResponseSelection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_sniff: Option<BodySniff>,
}

impl ProviderData {
    /// Names of the template variables a request for this provider can set as parameters,
    /// sorted and deduplicated.
    #[must_use]
    pub fn available_params(&self) -> Vec<String> {
        let mut params: Vec<String> = template_vars(&self.url)
            .chain(
                self.response_selections
                    .iter()
                    .flat_map(|selection| template_vars(&selection.response_match)),
            )
            .map(ToString::to_string)
            .collect();
        params.sort_unstable();
        params.dedup();
        params
    }
}

/// Iterates over the `{{name}}` variables of `template`.
fn template_vars(template: &str) -> impl Iterator<Item = &str> {
    template
        .split("{{")
        .skip(1)
        .filter_map(|chunk| chunk.split_once("}}").map(|(name, _)| name.trim()))
        .filter(|name| !name.is_empty())
}

/// Resolves provider references into provider metadata.
///
/// The Reclaim backend implements this (see [`crate::network::ReclaimBackend`]); tests and
/// offline tools can use a [`StaticDirectory`].
pub trait ProviderDirectory: Send + Sync {
    /// Resolves `provider_id`.
    ///
    /// # Errors
    /// Returns `UnknownProvider` if the directory does not know the provider, or a
    /// `NetworkError` if the directory could not be reached.
    fn resolve(
        &self,
        provider_id: &ProviderId,
    ) -> impl Future<Output = Result<ProviderData, ReclaimError>> + Send;
}

/// An in-memory provider directory.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    providers: HashMap<String, ProviderData>,
}

impl StaticDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `provider`, keyed by its `http_provider_id`.
    #[must_use]
    pub fn with_provider(mut self, provider: ProviderData) -> Self {
        self.insert(provider);
        self
    }

    /// Adds or replaces `provider`, keyed by its `http_provider_id`.
    pub fn insert(&mut self, provider: ProviderData) {
        self.providers
            .insert(provider.http_provider_id.clone(), provider);
    }
}

impl ProviderDirectory for StaticDirectory {
    async fn resolve(
        &self,
        provider_id: &ProviderId,
    ) -> Result<ProviderData, ReclaimError> {
        self.providers
            .get(provider_id.as_str())
            .cloned()
            .ok_or_else(|| ReclaimError::UnknownProvider(provider_id.to_string()))
    }
}
