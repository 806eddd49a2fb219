//! The user entity, its named wrapper, and the credential fields hanging off
//! of it.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use serde_yaml::{Mapping, Value};

use crate::{
    auth::{self, AuthProviderConfig, ExecConfig},
    bind::{self, Binder, LoadOptions},
    material,
};

const FIELDS: &[&str] = &[
    "auth-provider",
    "client-certificate",
    "client-certificate-data",
    "client-key",
    "client-key-data",
    "exec",
    "name",
    "password",
    "token",
    "username",
];

const NAMED_FIELDS: &[&str] = &["name", "user"];

/// A single user entry: the credentials used to authenticate against a
/// cluster.
///
/// Client certificate and key follow the same `(path, inline data)` rules as
/// the cluster's certificate authority. At most one of [`Self::exec`] and
/// [`Self::auth_provider`] is expected to be set; see [`Self::headers`] for
/// how the credential paths rank.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct User {
    name: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
    pub client_certificate: Option<String>,
    client_certificate_data: Option<String>,
    pub client_key: Option<String>,
    client_key_data: Option<String>,
    pub exec: Option<ExecConfig>,
    pub auth_provider: Option<AuthProviderConfig>,
    document_path: Option<PathBuf>,
}

impl User {
    pub(crate) fn from_mapping(mapping: &Mapping, options: &LoadOptions) -> Result<Self, bind::Error> {
        let binder = Binder::new(mapping, options.mode, FIELDS)?;

        Ok(Self {
            name: binder.string("name")?,
            username: binder.string("username")?,
            password: binder.string("password")?,
            token: binder.string("token")?,
            client_certificate: binder.string("client-certificate")?,
            client_certificate_data: binder.string("client-certificate-data")?,
            client_key: binder.string("client-key")?,
            client_key_data: binder.string("client-key-data")?,
            exec: binder
                .mapping("exec")?
                .map(|mapping| ExecConfig::from_mapping(mapping, options))
                .transpose()?,
            auth_provider: binder
                .mapping("auth-provider")?
                .map(|mapping| AuthProviderConfig::from_mapping(mapping, options))
                .transpose()?,
            document_path: options.path.clone(),
        })
    }

    /// The name inherited from the owning [`NamedUser`]. Not part of the
    /// entry's own document fields.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    /// The base64-encoded client certificate data, read from
    /// [`Self::client_certificate`] when no inline data is set. The file is
    /// re-read on every call.
    pub fn client_certificate_data(&self) -> Result<Option<String>, material::Error> {
        material::resolve(
            self.client_certificate_data.as_deref(),
            self.client_certificate.as_deref(),
            self.document_path.as_deref(),
        )
    }

    pub fn set_client_certificate_data(&mut self, data: Option<String>) {
        self.client_certificate_data = data;
    }

    /// The decoded client certificate bytes.
    pub fn client_certificate_data_raw(&self) -> Result<Option<Vec<u8>>, material::Error> {
        self.client_certificate_data()?
            .map(|data| material::decode(&data))
            .transpose()
    }

    pub fn set_client_certificate_data_raw(&mut self, raw: impl AsRef<[u8]>) {
        self.client_certificate_data = Some(material::encode(raw));
    }

    /// The base64-encoded client key data, read from [`Self::client_key`]
    /// when no inline data is set. The file is re-read on every call.
    pub fn client_key_data(&self) -> Result<Option<String>, material::Error> {
        material::resolve(
            self.client_key_data.as_deref(),
            self.client_key.as_deref(),
            self.document_path.as_deref(),
        )
    }

    pub fn set_client_key_data(&mut self, data: Option<String>) {
        self.client_key_data = data;
    }

    /// The decoded client key bytes.
    pub fn client_key_data_raw(&self) -> Result<Option<Vec<u8>>, material::Error> {
        self.client_key_data()?
            .map(|data| material::decode(&data))
            .transpose()
    }

    pub fn set_client_key_data_raw(&mut self, raw: impl AsRef<[u8]>) {
        self.client_key_data = Some(material::encode(raw));
    }

    /// Sets the document path against which relative file references resolve
    /// and in which an exec credential plugin runs.
    pub fn set_document_path(&mut self, path: Option<PathBuf>) {
        self.document_path = path;
    }

    pub fn document_path(&self) -> Option<&Path> {
        self.document_path.as_deref()
    }

    /// Materializes the client certificate and key data and drops the file
    /// references, making the entry self-contained.
    pub fn flatten_in_place(&mut self) -> Result<(), material::Error> {
        if let Some(data) = self.client_certificate_data()? {
            self.client_certificate_data = Some(data);
            self.client_certificate = None;
        }

        if let Some(data) = self.client_key_data()? {
            self.client_key_data = Some(data);
            self.client_key = None;
        }

        Ok(())
    }

    /// Resolves the authentication headers for this user.
    ///
    /// First match wins: the exec credential plugin, the configured auth
    /// provider, the static bearer token, otherwise no headers at all.
    /// Credential errors surface here rather than at load time, so a
    /// document with an unusable credential configuration can still be
    /// inspected and merged.
    pub fn headers(&self) -> Result<HashMap<String, String>, auth::Error> {
        if let Some(exec) = &self.exec {
            exec.invoke()
        } else if let Some(provider) = &self.auth_provider {
            provider.headers(self)
        } else if let Some(token) = &self.token {
            Ok(auth::bearer_headers(token))
        } else {
            Ok(HashMap::new())
        }
    }

    pub(crate) fn to_mapping(&self, flatten: bool) -> Result<Mapping, material::Error> {
        let mut mapping = Mapping::new();

        if let Some(provider) = &self.auth_provider {
            bind::put_value(
                &mut mapping,
                "auth-provider",
                Value::Mapping(provider.to_mapping()),
            );
        }

        if flatten {
            bind::put_string(
                &mut mapping,
                "client-certificate-data",
                self.client_certificate_data()?.as_deref(),
            );
            bind::put_string(
                &mut mapping,
                "client-key-data",
                self.client_key_data()?.as_deref(),
            );
        } else {
            bind::put_string(
                &mut mapping,
                "client-certificate",
                self.client_certificate.as_deref(),
            );
            bind::put_string(
                &mut mapping,
                "client-certificate-data",
                self.client_certificate_data.as_deref(),
            );
            bind::put_string(&mut mapping, "client-key", self.client_key.as_deref());
            bind::put_string(
                &mut mapping,
                "client-key-data",
                self.client_key_data.as_deref(),
            );
        }

        bind::put_string(&mut mapping, "username", self.username.as_deref());
        bind::put_string(&mut mapping, "password", self.password.as_deref());
        bind::put_string(&mut mapping, "token", self.token.as_deref());

        if let Some(exec) = &self.exec {
            bind::put_value(&mut mapping, "exec", Value::Mapping(exec.to_mapping()));
        }

        Ok(mapping)
    }
}

/// Pairs a name with a [`User`], as laid out in the document schema.
///
/// Construction propagates the name into the wrapped user, so the user can
/// report its own name without the document duplicating it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NamedUser {
    pub name: String,
    pub user: User,
}

impl NamedUser {
    pub fn new(name: impl Into<String>, mut user: User) -> Self {
        let name = name.into();
        user.set_name(name.clone());
        Self { name, user }
    }

    pub(crate) fn from_mapping(mapping: &Mapping, options: &LoadOptions) -> Result<Self, bind::Error> {
        let binder = Binder::new(mapping, options.mode, NAMED_FIELDS)?;

        let name = binder.string("name")?.unwrap_or_default();
        let user = binder
            .mapping("user")?
            .map(|mapping| User::from_mapping(mapping, options))
            .transpose()?
            .unwrap_or_default();

        Ok(Self::new(name, user))
    }

    pub(crate) fn to_mapping(&self, flatten: bool) -> Result<Mapping, material::Error> {
        let mut mapping = Mapping::new();
        bind::put_string(&mut mapping, "name", Some(&self.name));
        bind::put_value(
            &mut mapping,
            "user",
            Value::Mapping(self.user.to_mapping(flatten)?),
        );

        Ok(mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exec_plugin_outranks_the_static_token() {
        let mut exec = ExecConfig::default();
        exec.command = Some("echo".to_owned());
        exec.args = vec!["abc".to_owned()];

        let mut user = User::default();
        user.token = Some("t".to_owned());
        user.exec = Some(exec);

        let headers = user.headers().expect("exec plugin must succeed");
        assert_eq!(
            headers.get(auth::AUTHORIZATION).map(String::as_str),
            Some("Bearer abc")
        );
    }

    #[test]
    fn static_token_becomes_a_bearer_header() {
        let mut user = User::default();
        user.token = Some("t".to_owned());

        let headers = user.headers().expect("token must resolve");
        assert_eq!(
            headers.get(auth::AUTHORIZATION).map(String::as_str),
            Some("Bearer t")
        );
    }

    #[test]
    fn user_without_credentials_resolves_to_no_headers() {
        let headers = User::default().headers().expect("must resolve");
        assert!(headers.is_empty());
    }

    #[test]
    fn wrapper_name_is_propagated_into_the_user() {
        let named = NamedUser::new("admin", User::default());
        assert_eq!(named.user.name(), Some("admin"));
    }

    #[test]
    fn client_material_is_read_from_files_and_flattened() {
        let dir = tempfile::tempdir().expect("create temporary directory");
        std::fs::write(dir.path().join("client.crt"), b"cert").expect("write cert file");
        std::fs::write(dir.path().join("client.key"), b"key").expect("write key file");

        let mut user = User::default();
        user.client_certificate = Some("client.crt".to_owned());
        user.client_key = Some("client.key".to_owned());
        user.set_document_path(Some(dir.path().join("config")));

        assert_eq!(
            user.client_certificate_data_raw().expect("material must resolve"),
            Some(b"cert".to_vec())
        );

        user.flatten_in_place().expect("flatten must succeed");
        assert_eq!(user.client_certificate, None);
        assert_eq!(user.client_key, None);
        assert_eq!(
            user.client_key_data().expect("material must resolve"),
            Some(material::encode(b"key"))
        );
    }
}
