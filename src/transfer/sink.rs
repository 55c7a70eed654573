//! Output sink identity and default output naming.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use tracing::debug;
use url::Url;

/// Filename used when the URL path does not end in a usable segment.
pub const DEFAULT_OUTPUT_FILENAME: &str = "index.html";

/// Where downloaded bytes go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sink {
    /// A local file, resumable across attempts and runs.
    File(PathBuf),
    /// Standard output. Never resumable.
    Stdout,
}

impl Sink {
    /// Builds a sink from an `-O` argument, where `-` means standard output.
    #[must_use]
    pub fn from_arg(arg: &str) -> Self {
        if arg == "-" {
            Self::Stdout
        } else {
            Self::File(PathBuf::from(arg))
        }
    }

    /// Builds the default file sink for a URL in the current directory.
    #[must_use]
    pub fn for_url(url: &str) -> Self {
        Self::File(PathBuf::from(default_filename(url)))
    }

    /// Returns the file path, or `None` for stream sinks.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::File(path) => Some(path),
            Self::Stdout => None,
        }
    }

    /// Path used in error messages; `-` for standard output.
    #[must_use]
    pub fn display_path(&self) -> PathBuf {
        match self {
            Self::File(path) => path.clone(),
            Self::Stdout => PathBuf::from("-"),
        }
    }

    /// Whether bytes already written can be kept and appended to.
    #[must_use]
    pub fn is_resumable(&self) -> bool {
        matches!(self, Self::File(_))
    }
}

impl fmt::Display for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Stdout => f.write_str("<stdout>"),
        }
    }
}

/// Derives the output filename from the last URL path segment.
///
/// Falls back to [`DEFAULT_OUTPUT_FILENAME`] for unparseable URLs and for
/// paths ending in `/`.
#[must_use]
pub fn default_filename(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return DEFAULT_OUTPUT_FILENAME.to_string();
    };

    if let Some(mut segments) = parsed.path_segments()
        && let Some(last) = segments.next_back()
        && !last.is_empty()
    {
        let decoded = urlencoding::decode(last).unwrap_or_else(|e| {
            debug!(segment = %last, error = %e, "URL decoding failed, using raw segment");
            last.into()
        });
        let sanitized = sanitize_filename(&decoded);
        if !sanitized.trim_matches('_').is_empty() {
            return sanitized;
        }
    }

    DEFAULT_OUTPUT_FILENAME.to_string()
}

/// Replaces characters that are invalid on common filesystems:
/// / \ : * ? " < > |
fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if is_safe_filename_segment(&sanitized) {
        sanitized
    } else {
        sanitized
            .chars()
            .map(|c| if c == '.' { '_' } else { c })
            .collect()
    }
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}
