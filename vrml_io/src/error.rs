use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    #[error("invalid URI \"{0}\"")]
    InvalidUrl(String),

    #[error("{url}: {reason}")]
    UnreachableUrl { url: String, reason: String },

    #[error("no alternative URL could be opened: {}", .0.join(", "))]
    NoAlternativeUrl(Vec<String>),

    #[error("unsupported URI scheme \"{0}\"")]
    UnsupportedScheme(String),
}

impl ResourceError {
    pub fn unreachable(url: impl Into<String>, reason: impl ToString) -> Self {
        ResourceError::UnreachableUrl {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// The failure without the URL it applies to, for `<url>: <reason>` reporting.
    pub fn reason(&self) -> String {
        match self {
            ResourceError::InvalidUrl(_) => "invalid URI".to_string(),
            ResourceError::UnreachableUrl { reason, .. } => reason.clone(),
            ResourceError::NoAlternativeUrl(_) => "no alternative URL".to_string(),
            ResourceError::UnsupportedScheme(scheme) => {
                format!("unsupported URI scheme \"{scheme}\"")
            }
        }
    }
}
