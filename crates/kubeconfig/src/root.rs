//! The root document owning the named cluster, context and user collections.

use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};
use snafu::{OptionExt, ResultExt, Snafu, ensure};
use tracing::debug;

use crate::{
    bind::{self, Binder, LoadOptions},
    cluster::{Cluster, NamedCluster},
    context::{Context, NamedContext},
    material,
    user::{NamedUser, User},
};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("cluster not found: {name:?}"))]
    ClusterNotFound { name: String },

    #[snafu(display("cluster already exists: {name:?}"))]
    ClusterAlreadyExists { name: String },

    #[snafu(display("context not found: {name:?}"))]
    ContextNotFound { name: String },

    #[snafu(display("context already exists: {name:?}"))]
    ContextAlreadyExists { name: String },

    #[snafu(display("user not found: {name:?}"))]
    UserNotFound { name: String },

    #[snafu(display("user already exists: {name:?}"))]
    UserAlreadyExists { name: String },

    #[snafu(display("current-context is not set"))]
    CurrentContextUnset,

    #[snafu(display("failed to resolve credential material"))]
    ResolveMaterial { source: material::Error },

    #[snafu(display("failed to serialize document as YAML"))]
    SerializeDocument { source: serde_yaml::Error },

    #[snafu(display("failed to write document to {}", path.display()))]
    WriteDocument {
        source: std::io::Error,
        path: PathBuf,
    },
}

pub(crate) const DEFAULT_API_VERSION: &str = "v1";
pub(crate) const DEFAULT_KIND: &str = "Config";

const FIELDS: &[&str] = &[
    "apiVersion",
    "kind",
    "clusters",
    "contexts",
    "users",
    "current-context",
    "preferences",
];

/// Options applied when serializing a document.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SerializeOptions {
    /// Read all file references into their data fields, like
    /// `kubectl config view --flatten`.
    pub flatten: bool,

    /// Reduce the document to the entries reachable from the current
    /// context, like `kubectl config view --minify`.
    pub minify: bool,
}

/// The root of a configuration document.
///
/// Owns the ordered collections of named clusters, contexts and users.
/// Names within a collection are expected to be unique, but this is enforced
/// by the merge rules, not by construction: [`Self::create_cluster`] and
/// friends happily append duplicates.
#[derive(Clone, Debug, PartialEq)]
pub struct Root {
    pub api_version: String,
    pub kind: String,
    pub clusters: Vec<NamedCluster>,
    pub contexts: Vec<NamedContext>,
    pub users: Vec<NamedUser>,
    pub current_context: Option<String>,
    pub preferences: Mapping,
}

impl Default for Root {
    fn default() -> Self {
        Self {
            api_version: DEFAULT_API_VERSION.to_owned(),
            kind: DEFAULT_KIND.to_owned(),
            clusters: Vec::new(),
            contexts: Vec::new(),
            users: Vec::new(),
            current_context: None,
            preferences: Mapping::new(),
        }
    }
}

impl Root {
    /// Parses a single document.
    pub fn from_yaml(text: &str, options: &LoadOptions) -> Result<Self, bind::Error> {
        let mapping = bind::parse_document(text)?;
        Self::from_mapping(&mapping, options)
    }

    pub(crate) fn from_mapping(mapping: &Mapping, options: &LoadOptions) -> Result<Self, bind::Error> {
        let binder = Binder::new(mapping, options.mode, FIELDS)?;

        Ok(Self {
            api_version: binder.string_or("apiVersion", DEFAULT_API_VERSION)?,
            kind: binder.string_or("kind", DEFAULT_KIND)?,
            clusters: binder
                .mapping_seq("clusters")?
                .into_iter()
                .map(|mapping| NamedCluster::from_mapping(mapping, options))
                .collect::<Result<_, _>>()?,
            contexts: binder
                .mapping_seq("contexts")?
                .into_iter()
                .map(|mapping| NamedContext::from_mapping(mapping, options))
                .collect::<Result<_, _>>()?,
            users: binder
                .mapping_seq("users")?
                .into_iter()
                .map(|mapping| NamedUser::from_mapping(mapping, options))
                .collect::<Result<_, _>>()?,
            current_context: binder.string("current-context")?,
            preferences: binder.mapping("preferences")?.cloned().unwrap_or_default(),
        })
    }

    /// Finds a named context. `None` defaults to the current context.
    pub fn named_context(&self, name: Option<&str>) -> Option<&NamedContext> {
        let name = name.or_else(|| self.current_context.as_deref())?;
        self.contexts.iter().find(|context| context.name == name)
    }

    /// Finds a context. `None` defaults to the current context.
    pub fn context(&self, name: Option<&str>) -> Option<&Context> {
        self.named_context(name).map(|named| &named.context)
    }

    /// Finds a named cluster. `None` defaults to the current context's
    /// cluster reference.
    pub fn named_cluster(&self, name: Option<&str>) -> Option<&NamedCluster> {
        let name = match name {
            Some(name) => name,
            None => self.context(None)?.cluster.as_deref()?,
        };
        self.clusters.iter().find(|cluster| cluster.name == name)
    }

    /// Finds a cluster. `None` defaults to the current context's cluster
    /// reference.
    pub fn cluster(&self, name: Option<&str>) -> Option<&Cluster> {
        self.named_cluster(name).map(|named| &named.cluster)
    }

    pub fn cluster_mut(&mut self, name: Option<&str>) -> Option<&mut Cluster> {
        let name = match name {
            Some(name) => name.to_owned(),
            None => self.context(None)?.cluster.clone()?,
        };
        self.clusters
            .iter_mut()
            .find(|cluster| cluster.name == name)
            .map(|named| &mut named.cluster)
    }

    /// Finds a named user. `None` defaults to the current context's user
    /// reference.
    pub fn named_user(&self, name: Option<&str>) -> Option<&NamedUser> {
        let name = match name {
            Some(name) => name,
            None => self.context(None)?.user.as_deref()?,
        };
        self.users.iter().find(|user| user.name == name)
    }

    /// Finds a user. `None` defaults to the current context's user
    /// reference.
    pub fn user(&self, name: Option<&str>) -> Option<&User> {
        self.named_user(name).map(|named| &named.user)
    }

    pub fn user_mut(&mut self, name: Option<&str>) -> Option<&mut User> {
        let name = match name {
            Some(name) => name.to_owned(),
            None => self.context(None)?.user.clone()?,
        };
        self.users
            .iter_mut()
            .find(|user| user.name == name)
            .map(|named| &mut named.user)
    }

    /// Appends a new named cluster. Duplicate names are permitted,
    /// uniqueness is a merge-time concern.
    pub fn create_cluster(&mut self, name: impl Into<String>, cluster: Cluster) -> &mut NamedCluster {
        self.clusters.push(NamedCluster::new(name, cluster));
        let last = self.clusters.len() - 1;
        &mut self.clusters[last]
    }

    /// Appends a new named context. Duplicate names are permitted.
    pub fn create_context(&mut self, name: impl Into<String>, context: Context) -> &mut NamedContext {
        self.contexts.push(NamedContext::new(name, context));
        let last = self.contexts.len() - 1;
        &mut self.contexts[last]
    }

    /// Appends a new named user, propagating the name into the user.
    /// Duplicate names are permitted.
    pub fn create_user(&mut self, name: impl Into<String>, user: User) -> &mut NamedUser {
        self.users.push(NamedUser::new(name, user));
        let last = self.users.len() - 1;
        &mut self.users[last]
    }

    /// Renames a cluster and rewrites every context reference to it.
    ///
    /// The current context keeps its value: it names a context, not a
    /// cluster, so only [`Self::rename_context`] ever touches it.
    pub fn rename_cluster(&mut self, old: &str, new: &str) -> Result<String> {
        ensure!(
            self.clusters.iter().any(|cluster| cluster.name == old),
            ClusterNotFoundSnafu { name: old }
        );
        ensure!(
            !self.clusters.iter().any(|cluster| cluster.name == new),
            ClusterAlreadyExistsSnafu { name: new }
        );

        for cluster in &mut self.clusters {
            if cluster.name == old {
                cluster.name = new.to_owned();
            }
        }

        for context in &mut self.contexts {
            if context.context.cluster.as_deref() == Some(old) {
                context.context.cluster = Some(new.to_owned());
            }
        }

        Ok(new.to_owned())
    }

    /// Renames a user and rewrites every context reference to it.
    pub fn rename_user(&mut self, old: &str, new: &str) -> Result<String> {
        ensure!(
            self.users.iter().any(|user| user.name == old),
            UserNotFoundSnafu { name: old }
        );
        ensure!(
            !self.users.iter().any(|user| user.name == new),
            UserAlreadyExistsSnafu { name: new }
        );

        for user in &mut self.users {
            if user.name == old {
                user.name = new.to_owned();
            }
        }

        for context in &mut self.contexts {
            if context.context.user.as_deref() == Some(old) {
                context.context.user = Some(new.to_owned());
            }
        }

        Ok(new.to_owned())
    }

    /// Renames a context, following the current context along when it names
    /// the renamed entry.
    pub fn rename_context(&mut self, old: &str, new: &str) -> Result<String> {
        ensure!(
            self.contexts.iter().any(|context| context.name == old),
            ContextNotFoundSnafu { name: old }
        );
        ensure!(
            !self.contexts.iter().any(|context| context.name == new),
            ContextAlreadyExistsSnafu { name: new }
        );

        for context in &mut self.contexts {
            if context.name == old {
                context.name = new.to_owned();
            }
        }

        if self.current_context.as_deref() == Some(old) {
            self.current_context = Some(new.to_owned());
        }

        Ok(new.to_owned())
    }

    /// Merges another document into this one, following the kubeconfig merge
    /// rules: collection entries are appended unless an entry of the same
    /// name already exists, scalar values are kept when already set. The
    /// receiver therefore wins every conflict.
    ///
    /// Appended entries are copies; later changes to `other` do not affect
    /// the merged result.
    pub fn merge_from(&mut self, other: &Self) {
        debug!(
            clusters = other.clusters.len(),
            contexts = other.contexts.len(),
            users = other.users.len(),
            "merging configuration document"
        );

        for cluster in &other.clusters {
            if self.named_cluster(Some(&cluster.name)).is_none() {
                self.clusters.push(cluster.clone());
            }
        }

        for context in &other.contexts {
            if self.named_context(Some(&context.name)).is_none() {
                self.contexts.push(context.clone());
            }
        }

        for user in &other.users {
            if self.named_user(Some(&user.name)).is_none() {
                self.users.push(user.clone());
            }
        }

        if self.api_version.is_empty() {
            self.api_version.clone_from(&other.api_version);
        }

        if self.kind.is_empty() {
            self.kind.clone_from(&other.kind);
        }

        if self.current_context.is_none() {
            self.current_context.clone_from(&other.current_context);
        }

        if self.preferences.is_empty() {
            self.preferences.clone_from(&other.preferences);
        }
    }

    /// The non-mutating form of [`Self::merge_from`].
    pub fn merge(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        merged.merge_from(other);
        merged
    }

    /// Reduces the document to the entries reachable from the current
    /// context, like `kubectl config view --minify`.
    ///
    /// Fails when no current context is set, and when the current context or
    /// an entry it references does not exist.
    pub fn minify_in_place(&mut self) -> Result<()> {
        let current = self
            .current_context
            .clone()
            .context(CurrentContextUnsetSnafu)?;

        let named_context = self
            .named_context(Some(&current))
            .with_context(|| ContextNotFoundSnafu {
                name: current.clone(),
            })?
            .clone();

        let named_cluster = match named_context.context.cluster.as_deref() {
            Some(name) => Some(
                self.named_cluster(Some(name))
                    .with_context(|| ClusterNotFoundSnafu { name })?
                    .clone(),
            ),
            None => None,
        };

        let named_user = match named_context.context.user.as_deref() {
            Some(name) => Some(
                self.named_user(Some(name))
                    .with_context(|| UserNotFoundSnafu { name })?
                    .clone(),
            ),
            None => None,
        };

        self.contexts = vec![named_context];
        self.clusters = named_cluster.into_iter().collect();
        self.users = named_user.into_iter().collect();

        Ok(())
    }

    /// The non-mutating form of [`Self::minify_in_place`].
    pub fn minify(&self) -> Result<Self> {
        let mut minified = self.clone();
        minified.minify_in_place()?;
        Ok(minified)
    }

    /// Reads every file reference into its data field and drops the paths,
    /// making the document self-contained.
    pub fn flatten_in_place(&mut self) -> Result<()> {
        for cluster in &mut self.clusters {
            cluster
                .cluster
                .flatten_in_place()
                .context(ResolveMaterialSnafu)?;
        }

        for user in &mut self.users {
            user.user.flatten_in_place().context(ResolveMaterialSnafu)?;
        }

        Ok(())
    }

    /// The non-mutating form of [`Self::flatten_in_place`].
    pub fn flatten(&self) -> Result<Self> {
        let mut flattened = self.clone();
        flattened.flatten_in_place()?;
        Ok(flattened)
    }

    /// Serializes the document into the untyped tree of the document schema.
    pub fn to_value(&self, options: SerializeOptions) -> Result<Value> {
        if options.minify {
            let minified = self.minify()?;
            return minified.to_value(SerializeOptions {
                minify: false,
                ..options
            });
        }

        let mut mapping = Mapping::new();
        bind::put_string(&mut mapping, "apiVersion", Some(&self.api_version));
        bind::put_string(&mut mapping, "kind", Some(&self.kind));

        let clusters = self
            .clusters
            .iter()
            .map(|cluster| cluster.to_mapping(options.flatten).map(Value::Mapping))
            .collect::<Result<Vec<_>, _>>()
            .context(ResolveMaterialSnafu)?;
        bind::put_value(&mut mapping, "clusters", Value::Sequence(clusters));

        let contexts = self
            .contexts
            .iter()
            .map(|context| Value::Mapping(context.to_mapping()))
            .collect();
        bind::put_value(&mut mapping, "contexts", Value::Sequence(contexts));

        let users = self
            .users
            .iter()
            .map(|user| user.to_mapping(options.flatten).map(Value::Mapping))
            .collect::<Result<Vec<_>, _>>()
            .context(ResolveMaterialSnafu)?;
        bind::put_value(&mut mapping, "users", Value::Sequence(users));

        bind::put_string(&mut mapping, "current-context", self.current_context.as_deref());
        bind::put_value(&mut mapping, "preferences", Value::Mapping(self.preferences.clone()));

        Ok(Value::Mapping(mapping))
    }

    /// Serializes the document back to text.
    pub fn to_yaml(&self, options: SerializeOptions) -> Result<String> {
        serde_yaml::to_string(&self.to_value(options)?).context(SerializeDocumentSnafu)
    }

    /// Writes the serialized document to a file.
    pub fn write_file(&self, path: impl AsRef<Path>, options: SerializeOptions) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_yaml(options)?).with_context(|_| WriteDocumentSnafu { path })
    }
}
