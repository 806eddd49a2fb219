//! Discovery of configuration documents from the conventional locations.
//!
//! Look-up order of [`load_default`]:
//!
//! - the files named by the `KUBECONFIG` environment variable
//! - the first existing file of [`default_locations`]
//! - the in-cluster service-account configuration
//!
//! Multiple files merge pairwise in the order given, so the first file wins
//! every conflict; see [`Root::merge_from`].

use std::{
    env,
    path::{Path, PathBuf},
};

use snafu::{OptionExt, ResultExt, Snafu};
use tracing::debug;

use crate::{
    bind::{self, BindMode, LoadOptions},
    builder::RootBuilder,
    root::Root,
};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("no configuration paths were given"))]
    NoPathsGiven,

    #[snafu(display("the {variable} environment variable is not set"))]
    EnvUnset { variable: &'static str },

    #[snafu(display("failed to read configuration file {}", path.display()))]
    ReadConfigFile {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to parse configuration file {}", path.display()))]
    ParseConfigFile { source: bind::Error, path: PathBuf },

    #[snafu(display("failed to read service account token from {}", path.display()))]
    ReadServiceAccountToken {
        source: std::io::Error,
        path: PathBuf,
    },
}

pub const KUBECONFIG_ENV: &str = "KUBECONFIG";

const SERVICE_HOST_ENV: &str = "KUBERNETES_SERVICE_HOST";
const SERVICE_PORT_ENV: &str = "KUBERNETES_SERVICE_PORT_HTTPS";
const TELEPRESENCE_ROOT_ENV: &str = "TELEPRESENCE_ROOT";
const SERVICE_ACCOUNT_DIR: &str = "var/run/secrets/kubernetes.io/serviceaccount";

/// The well-known locations probed by [`load_default`], in order. The
/// kubelet configuration usually has restricted access rights.
pub fn default_locations() -> Vec<PathBuf> {
    let mut locations = Vec::new();

    if let Some(home) = dirs::home_dir() {
        locations.push(home.join(".kube").join("config"));
    }

    locations.push(PathBuf::from("/etc/kubernetes/admin.conf"));
    locations.push(PathBuf::from("/etc/kubernetes/kubelet.conf"));
    locations
}

fn load_one(path: &Path, mode: BindMode) -> Result<Root> {
    debug!(path = %path.display(), "loading configuration file");

    let text = std::fs::read_to_string(path).with_context(|_| ReadConfigFileSnafu { path })?;
    Root::from_yaml(
        &text,
        &LoadOptions {
            mode,
            path: Some(path.to_path_buf()),
        },
    )
    .with_context(|_| ParseConfigFileSnafu { path })
}

/// Loads one or more configuration files, merging them in the order given.
pub fn load_file(paths: &[impl AsRef<Path>], mode: BindMode) -> Result<Root> {
    let (first, rest) = paths.split_first().context(NoPathsGivenSnafu)?;

    let mut root = load_one(first.as_ref(), mode)?;
    for path in rest {
        let next = load_one(path.as_ref(), mode)?;
        root.merge_from(&next);
    }

    Ok(root)
}

/// Loads and merges the configuration files named by the colon-separated
/// `KUBECONFIG` environment variable.
pub fn load_env(mode: BindMode) -> Result<Root> {
    let value = env::var(KUBECONFIG_ENV)
        .ok()
        .filter(|value| !value.is_empty())
        .context(EnvUnsetSnafu {
            variable: KUBECONFIG_ENV,
        })?;

    let paths = value
        .split(':')
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
        .collect::<Vec<_>>();

    load_file(&paths, mode)
}

/// Loads a configuration from the default locations, returning `None` when
/// none of them applies.
pub fn load_default(mode: BindMode) -> Result<Option<Root>> {
    if env::var_os(KUBECONFIG_ENV).is_some() {
        return load_env(mode).map(Some);
    }

    if let Some(existing) = default_locations().into_iter().find(|path| path.exists()) {
        return load_file(&[existing], mode).map(Some);
    }

    if env::var_os(SERVICE_HOST_ENV).is_some() && env::var_os(SERVICE_PORT_ENV).is_some() {
        return in_cluster().map(Some);
    }

    Ok(None)
}

/// Builds the "in cluster" configuration from the service-account material
/// mounted into every pod.
pub fn in_cluster() -> Result<Root> {
    let host = env::var(SERVICE_HOST_ENV).ok().context(EnvUnsetSnafu {
        variable: SERVICE_HOST_ENV,
    })?;
    let port = env::var(SERVICE_PORT_ENV).ok().context(EnvUnsetSnafu {
        variable: SERVICE_PORT_ENV,
    })?;

    let secrets_root = env::var(TELEPRESENCE_ROOT_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/"))
        .join(SERVICE_ACCOUNT_DIR);

    let ca_file = secrets_root.join("ca.crt");
    let token_file = secrets_root.join("token");

    let mut builder = RootBuilder::new()
        .server(format!("https://{host}:{port}"))
        .certificate_authority(ca_file.to_string_lossy().into_owned());

    if token_file.exists() {
        let token = std::fs::read_to_string(&token_file)
            .with_context(|_| ReadServiceAccountTokenSnafu { path: &token_file })?;
        builder = builder.token(token.trim_end());
    }

    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use indoc::indoc;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn earlier_files_win_over_later_ones() {
        let dir = tempdir().expect("create temporary directory");
        let first = dir.path().join("first");
        let second = dir.path().join("second");

        fs::write(
            &first,
            indoc! {"
                clusters:
                  - name: shared
                    cluster:
                      server: https://first.example.com
            "},
        )
        .expect("write first file");
        fs::write(
            &second,
            indoc! {"
                current-context: from-second
                clusters:
                  - name: shared
                    cluster:
                      server: https://second.example.com
                  - name: extra
                    cluster:
                      server: https://extra.example.com
            "},
        )
        .expect("write second file");

        let root = load_file(&[first, second], BindMode::Strict).expect("files must load");

        assert_eq!(
            root.cluster(Some("shared")).and_then(|c| c.server.as_deref()),
            Some("https://first.example.com")
        );
        assert_eq!(root.clusters.len(), 2);
        assert_eq!(root.current_context.as_deref(), Some("from-second"));
    }

    #[test]
    fn loaded_documents_resolve_files_next_to_themselves() {
        let dir = tempdir().expect("create temporary directory");
        fs::write(dir.path().join("ca.crt"), b"ca bytes").expect("write ca file");
        fs::write(
            dir.path().join("config"),
            indoc! {"
                clusters:
                  - name: local
                    cluster:
                      certificate-authority: ca.crt
            "},
        )
        .expect("write config file");

        let root =
            load_file(&[dir.path().join("config")], BindMode::Strict).expect("file must load");

        assert_eq!(
            root.cluster(Some("local"))
                .expect("cluster must be present")
                .certificate_authority_data()
                .expect("material must resolve"),
            Some(crate::material::encode(b"ca bytes"))
        );
    }

    #[test]
    fn empty_path_list_is_rejected() {
        let error = load_file(&Vec::<PathBuf>::new(), BindMode::Strict)
            .err()
            .expect("must fail");
        assert!(matches!(error, Error::NoPathsGiven));
    }
}
