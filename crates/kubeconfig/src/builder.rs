//! Convenience construction of single-entry configuration documents.

use std::path::PathBuf;

use crate::{
    cluster::{Cluster, NamedCluster},
    context::{Context, NamedContext},
    root::Root,
    user::{NamedUser, User},
};

/// Builds a [`Root`] containing one cluster, one user and one context wired
/// together, as needed for the in-cluster service-account configuration or
/// for tests.
///
/// ```
/// use kubeconfig::RootBuilder;
///
/// let root = RootBuilder::new().token("foo").build();
///
/// assert_eq!(root.current_context.as_deref(), Some("k8s@kubernetes-cluster"));
/// assert_eq!(
///     root.user(None).and_then(|user| user.token.as_deref()),
///     Some("foo")
/// );
/// ```
#[derive(Clone, Debug)]
pub struct RootBuilder {
    user_name: String,
    cluster_name: String,
    context_name: Option<String>,
    server: String,
    namespace: Option<String>,
    token: Option<String>,
    username: Option<String>,
    password: Option<String>,
    certificate_authority: Option<String>,
    certificate_authority_data: Option<String>,
    client_certificate: Option<String>,
    client_key: Option<String>,
    insecure_skip_tls_verify: Option<bool>,
    document_path: Option<PathBuf>,
}

impl Default for RootBuilder {
    fn default() -> Self {
        Self {
            user_name: "k8s".to_owned(),
            cluster_name: "kubernetes-cluster".to_owned(),
            context_name: None,
            server: "https://localhost:8080".to_owned(),
            namespace: None,
            token: None,
            username: None,
            password: None,
            certificate_authority: None,
            certificate_authority_data: None,
            client_certificate: None,
            client_key: None,
            insecure_skip_tls_verify: None,
            document_path: None,
        }
    }
}

impl RootBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_name(mut self, name: impl Into<String>) -> Self {
        self.user_name = name.into();
        self
    }

    pub fn cluster_name(mut self, name: impl Into<String>) -> Self {
        self.cluster_name = name.into();
        self
    }

    /// Defaults to `<user>@<cluster>` when unset.
    pub fn context_name(mut self, name: impl Into<String>) -> Self {
        self.context_name = Some(name.into());
        self
    }

    pub fn server(mut self, server: impl Into<String>) -> Self {
        self.server = server.into();
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn certificate_authority(mut self, path: impl Into<String>) -> Self {
        self.certificate_authority = Some(path.into());
        self
    }

    pub fn certificate_authority_data(mut self, data: impl Into<String>) -> Self {
        self.certificate_authority_data = Some(data.into());
        self
    }

    pub fn client_certificate(mut self, path: impl Into<String>) -> Self {
        self.client_certificate = Some(path.into());
        self
    }

    pub fn client_key(mut self, path: impl Into<String>) -> Self {
        self.client_key = Some(path.into());
        self
    }

    pub fn insecure_skip_tls_verify(mut self, skip: bool) -> Self {
        self.insecure_skip_tls_verify = Some(skip);
        self
    }

    /// The document path against which relative file references resolve.
    pub fn document_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.document_path = Some(path.into());
        self
    }

    pub fn build(self) -> Root {
        let context_name = self
            .context_name
            .unwrap_or_else(|| format!("{}@{}", self.user_name, self.cluster_name));

        let mut cluster = Cluster::default();
        cluster.server = Some(self.server);
        cluster.certificate_authority = self.certificate_authority;
        cluster.set_certificate_authority_data(self.certificate_authority_data);
        cluster.insecure_skip_tls_verify = self.insecure_skip_tls_verify;
        cluster.set_document_path(self.document_path.clone());

        let mut user = User::default();
        user.token = self.token;
        user.username = self.username;
        user.password = self.password;
        user.client_certificate = self.client_certificate;
        user.client_key = self.client_key;
        user.set_document_path(self.document_path);

        let context = Context {
            cluster: Some(self.cluster_name.clone()),
            user: Some(self.user_name.clone()),
            namespace: self.namespace,
        };

        Root {
            current_context: Some(context_name.clone()),
            clusters: vec![NamedCluster::new(self.cluster_name, cluster)],
            contexts: vec![NamedContext::new(context_name, context)],
            users: vec![NamedUser::new(self.user_name, user)],
            ..Root::default()
        }
    }
}
