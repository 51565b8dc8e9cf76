use crate::ResourceError;
use std::path::Path;
use url::{ParseError, Url};

/// A reference with no scheme, which must be resolved against a base.
pub fn is_relative(reference: &str) -> bool {
    matches!(
        Url::parse(reference),
        Err(ParseError::RelativeUrlWithoutBase)
    )
}

pub fn parse(reference: &str) -> Result<Url, ResourceError> {
    Url::parse(reference).map_err(|_| ResourceError::InvalidUrl(reference.to_string()))
}

/// Resolve `reference` against the absolute URI `base`. An absolute reference
/// is returned unchanged.
pub fn resolve(base: &str, reference: &str) -> Result<Url, ResourceError> {
    if !is_relative(reference) {
        return parse(reference);
    }
    let base = parse(base)?;
    base.join(reference)
        .map_err(|_| ResourceError::InvalidUrl(reference.to_string()))
}

/// `file:` URL for `reference` relative to the directory `dir`.
pub fn file_url_in(dir: &Path, reference: &str) -> Result<Url, ResourceError> {
    let base = Url::from_directory_path(dir)
        .map_err(|_| ResourceError::InvalidUrl(dir.display().to_string()))?;
    base.join(reference)
        .map_err(|_| ResourceError::InvalidUrl(reference.to_string()))
}

/// `file:` URL for `reference` relative to the process working directory.
pub fn file_url_in_working_dir(reference: &str) -> Result<Url, ResourceError> {
    let cwd = std::env::current_dir()
        .map_err(|e| ResourceError::unreachable(reference, e))?;
    file_url_in(&cwd, reference)
}

/// The URL with any fragment removed; fragments name viewpoints, not resources.
pub fn without_fragment(url: &Url) -> Url {
    let mut url = url.clone();
    url.set_fragment(None);
    url
}
