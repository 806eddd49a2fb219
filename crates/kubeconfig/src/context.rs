//! The context entity and its named wrapper.

use serde_yaml::{Mapping, Value};

use crate::bind::{self, Binder, LoadOptions};

const FIELDS: &[&str] = &["cluster", "user", "namespace"];

const NAMED_FIELDS: &[&str] = &["name", "context"];

/// A context binds a cluster and a user together under one name, optionally
/// pinning a namespace.
///
/// `cluster` and `user` are name references, not owned values. They are
/// resolved against the owning document's collections at lookup time, so a
/// context may name entries that do not (yet) exist.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Context {
    pub cluster: Option<String>,
    pub user: Option<String>,
    pub namespace: Option<String>,
}

impl Context {
    pub(crate) fn from_mapping(mapping: &Mapping, options: &LoadOptions) -> Result<Self, bind::Error> {
        let binder = Binder::new(mapping, options.mode, FIELDS)?;

        Ok(Self {
            cluster: binder.string("cluster")?,
            user: binder.string("user")?,
            namespace: binder.string("namespace")?,
        })
    }

    pub(crate) fn to_mapping(&self) -> Mapping {
        let mut mapping = Mapping::new();
        bind::put_string(&mut mapping, "cluster", self.cluster.as_deref());
        bind::put_string(&mut mapping, "user", self.user.as_deref());
        bind::put_string(&mut mapping, "namespace", self.namespace.as_deref());
        mapping
    }
}

/// Pairs a name with a [`Context`], as laid out in the document schema.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NamedContext {
    pub name: String,
    pub context: Context,
}

impl NamedContext {
    pub fn new(name: impl Into<String>, context: Context) -> Self {
        Self {
            name: name.into(),
            context,
        }
    }

    pub(crate) fn from_mapping(mapping: &Mapping, options: &LoadOptions) -> Result<Self, bind::Error> {
        let binder = Binder::new(mapping, options.mode, NAMED_FIELDS)?;

        Ok(Self {
            name: binder.string("name")?.unwrap_or_default(),
            context: binder
                .mapping("context")?
                .map(|mapping| Context::from_mapping(mapping, options))
                .transpose()?
                .unwrap_or_default(),
        })
    }

    pub(crate) fn to_mapping(&self) -> Mapping {
        let mut mapping = Mapping::new();
        bind::put_string(&mut mapping, "name", Some(&self.name));
        bind::put_value(&mut mapping, "context", Value::Mapping(self.context.to_mapping()));
        mapping
    }
}
