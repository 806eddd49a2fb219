//! A parser and data model for Kubernetes client configuration
//! ("kubeconfig") documents: clusters, users, and the contexts binding them
//! together.
//!
//! Documents can be parsed from text or loaded from the conventional
//! on-disk locations, merged following the kubeconfig merge rules, trimmed
//! down to the active context, serialized back to YAML, and resolved into
//! the HTTP authentication headers a client should send.
//!
//! ```
//! use kubeconfig::{LoadOptions, Root};
//!
//! let root = Root::from_yaml(
//!     concat!(
//!         "clusters:\n",
//!         "  - name: local\n",
//!         "    cluster:\n",
//!         "      server: https://localhost:6443\n",
//!         "contexts:\n",
//!         "  - name: local\n",
//!         "    context: {cluster: local, user: admin}\n",
//!         "users:\n",
//!         "  - name: admin\n",
//!         "    user: {token: secret}\n",
//!         "current-context: local\n",
//!     ),
//!     &LoadOptions::default(),
//! )?;
//!
//! let user = root.user(None).expect("the current context names a user");
//! let headers = user.headers()?;
//! assert_eq!(
//!     headers.get("Authorization").map(String::as_str),
//!     Some("Bearer secret")
//! );
//! # Ok::<_, Box<dyn std::error::Error>>(())
//! ```
//!
//! ### See
//!
//! - <https://kubernetes.io/docs/concepts/configuration/organize-cluster-access-kubeconfig/>
//! - <https://kubernetes.io/docs/reference/access-authn-authz/authentication/>

pub mod auth;
pub mod bind;
pub mod builder;
pub mod cluster;
pub mod context;
pub mod discovery;
pub mod material;
pub mod root;
pub mod user;

pub use self::{
    auth::{AuthProviderConfig, ExecConfig, ExecEnv, ProviderHandler, register_provider},
    bind::{BindMode, LoadOptions},
    builder::RootBuilder,
    cluster::{Cluster, NamedCluster},
    context::{Context, NamedContext},
    root::{Root, SerializeOptions},
    user::{NamedUser, User},
};
