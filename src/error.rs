use thiserror::Error;

pub type Result<T> = std::result::Result<T, MarketError>;

/// Everything that can go wrong during a market scan. None of these are fatal
/// to the process; a `BatchUnavailable` is scoped to one request, the rest to
/// one analysis run.
#[derive(Error, Debug)]
pub enum MarketError {
    #[error("request failed after {attempts} attempts: {url}: {reason}")]
    BatchUnavailable {
        url: String,
        attempts: u32,
        reason: String,
    },

    #[error("invalid scan configuration: {0}")]
    Config(String),

    #[error("item catalog unavailable at {path}: {reason}")]
    CatalogUnavailable { path: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_error_names_the_path() {
        let err = MarketError::CatalogUnavailable {
            path: "items.json".into(),
            reason: "No such file or directory".into(),
        };
        assert!(err.to_string().contains("items.json"));
    }
}
