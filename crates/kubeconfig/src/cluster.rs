//! The cluster entity and its named wrapper.

use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};
use snafu::{ResultExt, Snafu};
use url::Url;

use crate::{
    bind::{self, Binder, LoadOptions},
    material,
};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to parse server address {server:?}"))]
    ParseServerAddress {
        source: url::ParseError,
        server: String,
    },
}

const FIELDS: &[&str] = &[
    "certificate-authority",
    "certificate-authority-data",
    "insecure-skip-tls-verify",
    "server",
];

const NAMED_FIELDS: &[&str] = &["name", "cluster"];

/// A single cluster entry: the API server address and the TLS material used
/// to verify it.
///
/// The certificate authority is either an inline base64-encoded copy or a
/// file path; the inline copy takes precedence. Relative paths resolve
/// against the directory of the document the entry was parsed from.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Cluster {
    pub server: Option<String>,
    pub certificate_authority: Option<String>,
    certificate_authority_data: Option<String>,
    pub insecure_skip_tls_verify: Option<bool>,
    document_path: Option<PathBuf>,
}

impl Cluster {
    pub(crate) fn from_mapping(mapping: &Mapping, options: &LoadOptions) -> Result<Self, bind::Error> {
        let binder = Binder::new(mapping, options.mode, FIELDS)?;

        Ok(Self {
            server: binder.string("server")?,
            certificate_authority: binder.string("certificate-authority")?,
            certificate_authority_data: binder.string("certificate-authority-data")?,
            insecure_skip_tls_verify: binder.bool("insecure-skip-tls-verify")?,
            document_path: options.path.clone(),
        })
    }

    /// The base64-encoded certificate authority data.
    ///
    /// Falls back to reading the [`Self::certificate_authority`] file when no
    /// inline data is set. The file is re-read on every call, so changes to
    /// it are picked up.
    pub fn certificate_authority_data(&self) -> Result<Option<String>, material::Error> {
        material::resolve(
            self.certificate_authority_data.as_deref(),
            self.certificate_authority.as_deref(),
            self.document_path.as_deref(),
        )
    }

    pub fn set_certificate_authority_data(&mut self, data: Option<String>) {
        self.certificate_authority_data = data;
    }

    /// The decoded certificate authority bytes.
    pub fn certificate_authority_data_raw(&self) -> Result<Option<Vec<u8>>, material::Error> {
        self.certificate_authority_data()?
            .map(|data| material::decode(&data))
            .transpose()
    }

    pub fn set_certificate_authority_data_raw(&mut self, raw: impl AsRef<[u8]>) {
        self.certificate_authority_data = Some(material::encode(raw));
    }

    /// The server address parsed as a URL.
    pub fn server_url(&self) -> Result<Option<Url>> {
        self.server
            .as_deref()
            .map(|server| Url::parse(server).context(ParseServerAddressSnafu { server }))
            .transpose()
    }

    /// Sets the document path against which relative file references resolve.
    pub fn set_document_path(&mut self, path: Option<PathBuf>) {
        self.document_path = path;
    }

    pub fn document_path(&self) -> Option<&Path> {
        self.document_path.as_deref()
    }

    /// Materializes the certificate authority data and drops the file
    /// reference, making the entry self-contained.
    pub fn flatten_in_place(&mut self) -> Result<(), material::Error> {
        if let Some(data) = self.certificate_authority_data()? {
            self.certificate_authority_data = Some(data);
            self.certificate_authority = None;
        }

        Ok(())
    }

    pub(crate) fn to_mapping(&self, flatten: bool) -> Result<Mapping, material::Error> {
        let mut mapping = Mapping::new();

        if flatten {
            bind::put_string(
                &mut mapping,
                "certificate-authority-data",
                self.certificate_authority_data()?.as_deref(),
            );
        } else {
            bind::put_string(
                &mut mapping,
                "certificate-authority",
                self.certificate_authority.as_deref(),
            );
            bind::put_string(
                &mut mapping,
                "certificate-authority-data",
                self.certificate_authority_data.as_deref(),
            );
        }

        bind::put_bool(
            &mut mapping,
            "insecure-skip-tls-verify",
            self.insecure_skip_tls_verify,
        );
        bind::put_string(&mut mapping, "server", self.server.as_deref());

        Ok(mapping)
    }
}

/// Pairs a name with a [`Cluster`], as laid out in the document schema.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NamedCluster {
    pub name: String,
    pub cluster: Cluster,
}

impl NamedCluster {
    pub fn new(name: impl Into<String>, cluster: Cluster) -> Self {
        Self {
            name: name.into(),
            cluster,
        }
    }

    pub(crate) fn from_mapping(mapping: &Mapping, options: &LoadOptions) -> Result<Self, bind::Error> {
        let binder = Binder::new(mapping, options.mode, NAMED_FIELDS)?;

        Ok(Self {
            name: binder.string("name")?.unwrap_or_default(),
            cluster: binder
                .mapping("cluster")?
                .map(|mapping| Cluster::from_mapping(mapping, options))
                .transpose()?
                .unwrap_or_default(),
        })
    }

    pub(crate) fn to_mapping(&self, flatten: bool) -> Result<Mapping, material::Error> {
        let mut mapping = Mapping::new();
        bind::put_string(&mut mapping, "name", Some(&self.name));
        bind::put_value(
            &mut mapping,
            "cluster",
            Value::Mapping(self.cluster.to_mapping(flatten)?),
        );

        Ok(mapping)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn certificate_authority_is_materialized_from_the_file() {
        let dir = tempdir().expect("create temporary directory");
        fs::write(dir.path().join("ca.crt"), b"ca bytes").expect("write ca file");

        let mut cluster = Cluster::default();
        cluster.certificate_authority = Some("ca.crt".to_owned());
        cluster.set_document_path(Some(dir.path().join("config")));

        assert_eq!(
            cluster
                .certificate_authority_data()
                .expect("material must resolve"),
            Some(material::encode(b"ca bytes"))
        );
        assert_eq!(
            cluster
                .certificate_authority_data_raw()
                .expect("material must decode"),
            Some(b"ca bytes".to_vec())
        );
    }

    #[test]
    fn inline_data_takes_precedence_over_the_file() {
        let mut cluster = Cluster::default();
        cluster.certificate_authority = Some("/does/not/exist".to_owned());
        cluster.set_certificate_authority_data_raw(b"inline");

        assert_eq!(
            cluster
                .certificate_authority_data_raw()
                .expect("material must resolve"),
            Some(b"inline".to_vec())
        );
    }

    #[test]
    fn flatten_clears_the_file_reference() {
        let dir = tempdir().expect("create temporary directory");
        fs::write(dir.path().join("ca.crt"), b"ca bytes").expect("write ca file");

        let mut cluster = Cluster::default();
        cluster.certificate_authority = Some("ca.crt".to_owned());
        cluster.set_document_path(Some(dir.path().join("config")));

        cluster.flatten_in_place().expect("flatten must succeed");
        let once = cluster.clone();
        cluster.flatten_in_place().expect("flatten must stay idempotent");

        assert_eq!(cluster, once);
        assert_eq!(cluster.certificate_authority, None);
        assert_eq!(
            cluster
                .certificate_authority_data()
                .expect("material must resolve"),
            Some(material::encode(b"ca bytes"))
        );
    }

    #[test]
    fn server_address_parses_as_url() {
        let mut cluster = Cluster::default();
        cluster.server = Some("https://localhost:6443".to_owned());

        let url = cluster
            .server_url()
            .expect("address must parse")
            .expect("address must be present");

        assert_eq!(url.port(), Some(6443));

        cluster.server = Some("::not a url::".to_owned());
        assert!(cluster.server_url().is_err());
    }
}
