//! Pluggable auth providers and the process-wide handler registry.

use std::{
    collections::HashMap,
    sync::{Arc, LazyLock, PoisonError, RwLock},
};

use serde_yaml::{Mapping, Value};
use snafu::OptionExt;

use crate::{
    auth::{Error, UnknownAuthProviderSnafu},
    bind::{self, Binder, LoadOptions},
    user::User,
};

const FIELDS: &[&str] = &["config", "name"];

/// A named auth provider entry together with its provider-specific
/// configuration.
///
/// The configuration is kept as the raw mapping it was parsed from, so a
/// document naming a provider this library has no handler for still loads
/// and stays inspectable. Only an actual [`Self::headers`] call without a
/// registered handler fails.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AuthProviderConfig {
    pub name: Option<String>,
    pub config: Mapping,
}

impl AuthProviderConfig {
    pub(crate) fn from_mapping(mapping: &Mapping, options: &LoadOptions) -> Result<Self, bind::Error> {
        let binder = Binder::new(mapping, options.mode, FIELDS)?;

        Ok(Self {
            name: binder.string("name")?,
            config: binder.mapping("config")?.cloned().unwrap_or_default(),
        })
    }

    pub(crate) fn to_mapping(&self) -> Mapping {
        let mut mapping = Mapping::new();
        bind::put_string(&mut mapping, "name", self.name.as_deref());
        bind::put_value(&mut mapping, "config", Value::Mapping(self.config.clone()));
        mapping
    }

    /// Resolves the registered handler for this provider and asks it for
    /// headers. `user` is the entry owning this provider configuration.
    pub fn headers(&self, user: &User) -> Result<HashMap<String, String>, Error> {
        let name = self.name.as_deref().unwrap_or_default();
        let handler = lookup(name).context(UnknownAuthProviderSnafu { name })?;
        handler.headers(self, user)
    }
}

/// Produces authentication headers from a provider entry.
///
/// Handlers are registered with [`register_provider`] and selected by
/// provider name, compared case-insensitively with all non-alphanumeric
/// characters stripped, so a document naming `azure-ad` selects a handler
/// registered as `AzureAD`.
pub trait ProviderHandler: Send + Sync {
    fn headers(
        &self,
        provider: &AuthProviderConfig,
        user: &User,
    ) -> Result<HashMap<String, String>, Error>;
}

static REGISTRY: LazyLock<RwLock<HashMap<String, Arc<dyn ProviderHandler>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// Registers a handler for the given provider name, replacing any previous
/// one. This is the extension point for auth providers the library does not
/// ship itself.
pub fn register_provider(name: &str, handler: Arc<dyn ProviderHandler>) {
    REGISTRY
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(normalize_name(name), handler);
}

fn lookup(name: &str) -> Option<Arc<dyn ProviderHandler>> {
    REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&normalize_name(name))
        .cloned()
}

fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticHandler;

    impl ProviderHandler for StaticHandler {
        fn headers(
            &self,
            provider: &AuthProviderConfig,
            _user: &User,
        ) -> Result<HashMap<String, String>, Error> {
            let token = provider
                .config
                .iter()
                .find_map(|(key, value)| {
                    key.as_str()
                        .filter(|key| *key == "token")
                        .and_then(|_| value.as_str())
                })
                .unwrap_or_default();

            Ok(crate::auth::bearer_headers(token))
        }
    }

    #[test]
    fn unregistered_provider_fails_only_when_invoked() {
        let provider = AuthProviderConfig {
            name: Some("no-such-provider".to_owned()),
            config: Mapping::new(),
        };

        let error = provider
            .headers(&User::default())
            .err()
            .expect("unregistered provider must fail");

        assert!(matches!(
            error,
            Error::UnknownAuthProvider { name } if name == "no-such-provider"
        ));
    }

    #[test]
    fn provider_names_match_ignoring_case_and_punctuation() {
        register_provider("StaticToken", Arc::new(StaticHandler));

        let mut config = Mapping::new();
        config.insert(Value::from("token"), Value::from("xyz"));
        let provider = AuthProviderConfig {
            name: Some("static-token".to_owned()),
            config,
        };

        let headers = provider
            .headers(&User::default())
            .expect("registered handler must be found");

        assert_eq!(
            headers.get(crate::auth::AUTHORIZATION).map(String::as_str),
            Some("Bearer xyz")
        );
    }
}
