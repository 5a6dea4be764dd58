//! Looks up one image per query and saves it into the output folder.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use path_clean::PathClean;
use tracing::{debug, info};
use url::Url;

use crate::error::FetchError;
use crate::search::ImageSearch;

/// Longest stem a derived filename may have.
pub const MAX_FILENAME_CHARS: usize = 150;
/// Extension used when the image URL has none.
pub const DEFAULT_EXTENSION: &str = ".jpg";

/// Makes `text` safe to use as a filename stem.
///
/// Surrounding whitespace is trimmed, each of `\ / : * ? " < > |` and every
/// ASCII control character becomes `_`, and the result is cut to
/// [`MAX_FILENAME_CHARS`] characters.
pub fn sanitize_filename(text: &str) -> String {
    text.trim()
        .chars()
        .map(|c| match c {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_ascii_control() => '_',
            c => c,
        })
        .take(MAX_FILENAME_CHARS)
        .collect()
}

/// Extension (with its dot) of the last path segment of `url`, or `.jpg`.
pub fn extension_for(url: &Url) -> String {
    url.path_segments()
        .and_then(|s| s.last())
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{}", sanitize_filename(ext)))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

/// Filename for the image found for `query` at `url`.
pub fn image_filename(query: &str, url: &Url) -> String {
    format!("{}{}", sanitize_filename(query), extension_for(url))
}

/// Joins `file_name` onto `dir`, refusing anything that lands outside it.
fn destination(dir: &Path, file_name: &str) -> Result<PathBuf, FetchError> {
    let base = dir.to_path_buf().clean();
    let combined = base.join(file_name).clean();
    if combined == base || !combined.starts_with(&base) {
        return Err(FetchError::UnsafePath(combined));
    }
    Ok(combined)
}

#[async_trait]
pub trait FetchImage: Send + Sync {
    /// Finds and saves the best image for `query` inside `dir`.
    ///
    /// `Ok(None)` means the search had no match; nothing was written.
    async fn fetch(&self, query: &str, dir: &Path) -> Result<Option<String>, FetchError>;
}

/// Search-then-download fetcher backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ImageFetcher<S> {
    search: S,
    client: reqwest::Client,
    timeout: Duration,
}

impl<S: ImageSearch> ImageFetcher<S> {
    pub fn new(search: S, client: reqwest::Client, timeout: Duration) -> Self {
        Self {
            search,
            client,
            timeout,
        }
    }

    /// Downloads `url` into `path`, overwriting whatever was there.
    async fn download(&self, url: &Url, path: &Path) -> Result<u64, FetchError> {
        debug!(%url, "downloading image");
        let response = self
            .client
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status(),
                url: url.to_string(),
            });
        }
        let bytes = response.bytes().await?;
        tokio::fs::write(path, &bytes)
            .await
            .map_err(|source| FetchError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(bytes.len() as u64)
    }
}

#[async_trait]
impl<S: ImageSearch> FetchImage for ImageFetcher<S> {
    async fn fetch(&self, query: &str, dir: &Path) -> Result<Option<String>, FetchError> {
        let Some(hit) = self.search.top_image(query).await? else {
            return Ok(None);
        };

        let file_name = image_filename(query, &hit.image_url);
        let path = destination(dir, &file_name)?;
        let size = self.download(&hit.image_url, &path).await?;
        info!(file = %file_name, bytes = size, source = %hit.image_url, "saved image");
        Ok(Some(file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn replaces_each_reserved_character() {
        assert_eq!(sanitize_filename(r#"a\b/c:d*e?f"g<h>i|j"#), "a_b_c_d_e_f_g_h_i_j");
        assert_eq!(sanitize_filename("a//b"), "a__b");
        assert_eq!(sanitize_filename("  red apple \t"), "red apple");
        assert_eq!(sanitize_filename("tab\there"), "tab_here");
        assert_eq!(sanitize_filename("del\u{7f}bell\u{7}"), "del_bell_");
        assert_eq!(sanitize_filename("next\u{85}line"), "next\u{85}line");
    }

    #[test]
    fn caps_length_at_150_chars() {
        let long = "é".repeat(400);
        let name = sanitize_filename(&long);
        assert_eq!(name.chars().count(), MAX_FILENAME_CHARS);

        let reserved = "?".repeat(200);
        let name = sanitize_filename(&reserved);
        assert_eq!(name, "_".repeat(150));
    }

    #[test]
    fn extension_comes_from_url_path() {
        assert_eq!(extension_for(&url("https://x.test/img/cat.PNG?size=2")), ".PNG");
        assert_eq!(extension_for(&url("https://x.test/a.b/photo.webp")), ".webp");
        assert_eq!(extension_for(&url("https://x.test/img/cat")), ".jpg");
        assert_eq!(extension_for(&url("https://x.test/")), ".jpg");
        assert_eq!(extension_for(&url("https://x.test/.hidden")), ".jpg");
    }

    #[test]
    fn filename_joins_stem_and_extension() {
        assert_eq!(
            image_filename("red: apple?", &url("https://x.test/apple.jpeg")),
            "red_ apple_.jpeg"
        );
    }

    #[test]
    fn destination_stays_inside_dir() {
        let dir = Path::new("/tmp/images");
        assert_eq!(
            destination(dir, "red apple.jpg").unwrap(),
            PathBuf::from("/tmp/images/red apple.jpg")
        );
        assert!(matches!(destination(dir, ".."), Err(FetchError::UnsafePath(_))));
        assert!(matches!(destination(dir, "."), Err(FetchError::UnsafePath(_))));
    }
}
