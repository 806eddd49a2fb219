//! Exec credential plugin configuration and invocation.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use serde_yaml::{Mapping, Value};
use snafu::{OptionExt, ResultExt, ensure};
use tracing::debug;

use crate::{
    auth::{self, Error, ExecCommandMissingSnafu, ExecPluginSnafu, ExecSpawnSnafu},
    bind::{self, Binder, LoadOptions},
    material,
};

pub(crate) const DEFAULT_EXEC_API_VERSION: &str = "client.authentication.k8s.io/v1beta1";

const FIELDS: &[&str] = &["apiVersion", "args", "command", "env"];

const ENV_FIELDS: &[&str] = &["name", "value"];

/// Configuration of an exec credential plugin: an external executable whose
/// standard output is a bearer token.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExecConfig {
    pub api_version: String,
    pub command: Option<String>,
    pub args: Vec<String>,
    pub env: Vec<ExecEnv>,
    document_path: Option<PathBuf>,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            api_version: DEFAULT_EXEC_API_VERSION.to_owned(),
            command: None,
            args: Vec::new(),
            env: Vec::new(),
            document_path: None,
        }
    }
}

/// One environment variable passed to the exec credential plugin. Entries
/// missing either half are skipped at invocation.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ExecEnv {
    pub name: Option<String>,
    pub value: Option<String>,
}

impl ExecEnv {
    pub(crate) fn from_mapping(mapping: &Mapping, options: &LoadOptions) -> Result<Self, bind::Error> {
        let binder = Binder::new(mapping, options.mode, ENV_FIELDS)?;

        Ok(Self {
            name: binder.string("name")?,
            value: binder.string("value")?,
        })
    }

    pub(crate) fn to_mapping(&self) -> Mapping {
        let mut mapping = Mapping::new();
        bind::put_string(&mut mapping, "name", self.name.as_deref());
        bind::put_string(&mut mapping, "value", self.value.as_deref());
        mapping
    }
}

impl ExecConfig {
    pub(crate) fn from_mapping(mapping: &Mapping, options: &LoadOptions) -> Result<Self, bind::Error> {
        let binder = Binder::new(mapping, options.mode, FIELDS)?;

        Ok(Self {
            api_version: binder.string_or("apiVersion", DEFAULT_EXEC_API_VERSION)?,
            command: binder.string("command")?,
            args: binder.string_seq("args")?,
            env: binder
                .mapping_seq("env")?
                .into_iter()
                .map(|mapping| ExecEnv::from_mapping(mapping, options))
                .collect::<Result<_, _>>()?,
            document_path: options.path.clone(),
        })
    }

    pub(crate) fn to_mapping(&self) -> Mapping {
        let mut mapping = Mapping::new();
        bind::put_string(&mut mapping, "apiVersion", Some(&self.api_version));
        bind::put_string(&mut mapping, "command", self.command.as_deref());
        bind::put_value(
            &mut mapping,
            "args",
            Value::Sequence(self.args.iter().map(|arg| Value::from(arg.as_str())).collect()),
        );
        bind::put_value(
            &mut mapping,
            "env",
            Value::Sequence(
                self.env
                    .iter()
                    .map(|env| Value::Mapping(env.to_mapping()))
                    .collect(),
            ),
        );
        mapping
    }

    /// Sets the document path whose directory becomes the plugin's working
    /// directory.
    pub fn set_document_path(&mut self, path: Option<PathBuf>) {
        self.document_path = path;
    }

    pub fn document_path(&self) -> Option<&Path> {
        self.document_path.as_deref()
    }

    /// Runs the plugin and interprets its trimmed standard output as a
    /// bearer token.
    ///
    /// The plugin inherits this process's environment augmented with the
    /// configured pairs and runs with the owning document's directory as its
    /// working directory. The call blocks without a timeout; callers needing
    /// one must wrap it externally.
    pub fn invoke(&self) -> Result<HashMap<String, String>, Error> {
        let command = self.command.as_deref().context(ExecCommandMissingSnafu)?;
        debug!(command, "invoking exec credential plugin");

        let mut child = Command::new(command);
        child.args(&self.args).stdin(Stdio::null());

        for env in &self.env {
            if let (Some(name), Some(value)) = (&env.name, &env.value) {
                child.env(name, value);
            }
        }

        if let Some(dir) = self.document_path.as_deref().map(material::base_dir) {
            child.current_dir(dir);
        }

        let output = child.output().context(ExecSpawnSnafu { command })?;
        ensure!(
            output.status.success(),
            ExecPluginSnafu {
                command,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }
        );

        let token = String::from_utf8_lossy(&output.stdout);
        Ok(auth::bearer_headers(token.trim()))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn stdout_becomes_a_bearer_token() {
        let mut exec = ExecConfig::default();
        exec.command = Some("echo".to_owned());
        exec.args = vec!["abc".to_owned()];

        let headers = exec.invoke().expect("plugin must succeed");
        assert_eq!(
            headers.get(auth::AUTHORIZATION).map(String::as_str),
            Some("Bearer abc")
        );
    }

    #[test]
    fn declared_environment_is_passed_to_the_plugin() {
        let mut exec = ExecConfig::default();
        exec.command = Some("sh".to_owned());
        exec.args = vec!["-c".to_owned(), "printf '%s' \"$PLUGIN_TOKEN\"".to_owned()];
        exec.env = vec![ExecEnv {
            name: Some("PLUGIN_TOKEN".to_owned()),
            value: Some("from-env".to_owned()),
        }];

        let headers = exec.invoke().expect("plugin must succeed");
        assert_eq!(
            headers.get(auth::AUTHORIZATION).map(String::as_str),
            Some("Bearer from-env")
        );
    }

    #[test]
    fn plugin_runs_in_the_document_directory() {
        let dir = tempdir().expect("create temporary directory");
        fs::write(dir.path().join("token"), "from-file").expect("write token file");

        let mut exec = ExecConfig::default();
        exec.command = Some("cat".to_owned());
        exec.args = vec!["token".to_owned()];
        exec.set_document_path(Some(dir.path().join("config")));

        let headers = exec.invoke().expect("plugin must succeed");
        assert_eq!(
            headers.get(auth::AUTHORIZATION).map(String::as_str),
            Some("Bearer from-file")
        );
    }

    #[test]
    fn failing_plugin_surfaces_its_error_output() {
        let mut exec = ExecConfig::default();
        exec.command = Some("sh".to_owned());
        exec.args = vec!["-c".to_owned(), "echo broken >&2; exit 3".to_owned()];

        let error = exec.invoke().err().expect("plugin must fail");
        assert!(matches!(
            error,
            Error::ExecPlugin { stderr, .. } if stderr.contains("broken")
        ));
    }

    #[test]
    fn missing_command_is_rejected() {
        let exec = ExecConfig::default();
        let error = exec.invoke().err().expect("missing command must fail");
        assert!(matches!(error, Error::ExecCommandMissing));
    }
}
