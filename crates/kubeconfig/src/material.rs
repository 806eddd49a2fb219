//! Resolution of the certificate and key material shared by the cluster and
//! user entities.
//!
//! Each piece of material is a pair of fields: a path to a file on disk and
//! an inline base64-encoded copy. The inline copy always wins. The file is
//! read lazily and never cached, so repeated reads observe changes to the
//! backing file.

use std::path::{Path, PathBuf};

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use snafu::{ResultExt, Snafu};
use tracing::trace;

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to read credential material from {}", path.display()))]
    ReadFile {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to decode base64 credential material"))]
    DecodeBase64 { source: base64::DecodeError },
}

/// The directory against which a document's relative file references are
/// resolved: the document path itself when it is a directory, otherwise the
/// parent directory of the document file.
pub(crate) fn base_dir(document_path: &Path) -> &Path {
    if document_path.is_dir() {
        document_path
    } else {
        document_path.parent().unwrap_or(document_path)
    }
}

fn resolve_path(document_path: Option<&Path>, path: &Path) -> PathBuf {
    match document_path {
        Some(document_path) if path.is_relative() => base_dir(document_path).join(path),
        _ => path.to_path_buf(),
    }
}

/// Resolves a `(path, inline data)` field pair into base64-encoded material.
///
/// Inline data is returned as-is. Otherwise the file at `path` is read
/// relative to the owning document and encoded. Returns `None` when neither
/// field is set.
pub(crate) fn resolve(
    inline: Option<&str>,
    path: Option<&str>,
    document_path: Option<&Path>,
) -> Result<Option<String>> {
    if let Some(inline) = inline {
        return Ok(Some(inline.to_owned()));
    }

    let Some(path) = path else {
        return Ok(None);
    };

    let path = resolve_path(document_path, Path::new(path));
    trace!(path = %path.display(), "reading credential material");

    let bytes = std::fs::read(&path).with_context(|_| ReadFileSnafu { path: path.clone() })?;
    Ok(Some(BASE64.encode(bytes)))
}

pub(crate) fn encode(raw: impl AsRef<[u8]>) -> String {
    BASE64.encode(raw.as_ref())
}

pub(crate) fn decode(encoded: &str) -> Result<Vec<u8>> {
    BASE64.decode(encoded).context(DecodeBase64Snafu)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn inline_data_wins_over_the_path() {
        let resolved = resolve(Some("aW5saW5l"), Some("/does/not/exist"), None)
            .expect("inline data must resolve");

        assert_eq!(resolved, Some("aW5saW5l".to_owned()));
    }

    #[test]
    fn file_reference_is_read_and_encoded() {
        let dir = tempdir().expect("create temporary directory");
        fs::write(dir.path().join("ca.crt"), b"certificate bytes").expect("write ca file");

        let document_path = dir.path().join("config");
        let resolved = resolve(None, Some("ca.crt"), Some(&document_path))
            .expect("file reference must resolve")
            .expect("material must be present");

        assert_eq!(resolved, encode(b"certificate bytes"));
        assert_eq!(decode(&resolved).expect("must decode"), b"certificate bytes");
    }

    #[test]
    fn file_reference_is_not_cached() {
        let dir = tempdir().expect("create temporary directory");
        let ca = dir.path().join("ca.crt");
        let document_path = dir.path().join("config");

        fs::write(&ca, b"before").expect("write ca file");
        let first = resolve(None, Some("ca.crt"), Some(&document_path)).expect("must resolve");

        fs::write(&ca, b"after").expect("rewrite ca file");
        let second = resolve(None, Some("ca.crt"), Some(&document_path)).expect("must resolve");

        assert_eq!(first, Some(encode(b"before")));
        assert_eq!(second, Some(encode(b"after")));
    }

    #[test]
    fn document_directory_is_used_as_base_when_it_is_a_directory() {
        let dir = tempdir().expect("create temporary directory");
        fs::write(dir.path().join("ca.crt"), b"bytes").expect("write ca file");

        let resolved = resolve(None, Some("ca.crt"), Some(dir.path()))
            .expect("file reference must resolve");

        assert_eq!(resolved, Some(encode(b"bytes")));
    }

    #[test]
    fn unreadable_file_reference_fails() {
        let dir = tempdir().expect("create temporary directory");
        let document_path = dir.path().join("config");

        let error = resolve(None, Some("missing.crt"), Some(&document_path))
            .err()
            .expect("missing file must fail");

        assert!(matches!(error, Error::ReadFile { .. }));
    }
}
