use thiserror::Error;

/// Errors raised while parsing or serializing a single manifest file.
///
/// Distinct from the loader's [`ImportCycle`]/[`ImportFetchError`] etc.,
/// which only make sense once multiple manifests are being resolved
/// together; those live in the `jiri` crate's loader module.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("malformed manifest")]
    Syntax(#[from] quick_xml::DeError),

    #[error("failed to serialize manifest")]
    Serialize(#[from] quick_xml::se::SeError),
}
