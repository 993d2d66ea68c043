use serde::{Deserialize, Serialize};

use crate::{
    error::ManifestError,
    hook::Hook,
    import::{Import, LocalImport},
    project::ProjectSpec,
};

/// A single manifest file: an ordered tree of imports, local-imports,
/// projects, and hooks.
///
/// Round-trips through [`Manifest::from_xml_str`] /
/// [`Manifest::to_xml_string`] with default-value spellings normalized away,
/// so `from_xml_str(&to_xml_string(m)?)? == m` for any `m` that was itself
/// produced by `from_xml_str`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename = "manifest")]
pub struct Manifest {
    #[serde(rename = "import", default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<Import>,

    #[serde(rename = "localimport", default, skip_serializing_if = "Vec::is_empty")]
    pub local_imports: Vec<LocalImport>,

    #[serde(rename = "project", default, skip_serializing_if = "Vec::is_empty")]
    pub projects: Vec<ProjectSpec>,

    #[serde(rename = "hook", default, skip_serializing_if = "Vec::is_empty")]
    pub hooks: Vec<Hook>,
}

impl Manifest {
    /// Parses a manifest from its textual form, normalizing default-value
    /// spellings on every project.
    pub fn from_xml_str(text: &str) -> Result<Self, ManifestError> {
        let mut manifest: Manifest = quick_xml::de::from_str(text)?;
        for project in &mut manifest.projects {
            project.normalize_defaults();
        }
        Ok(manifest)
    }

    /// Serializes this manifest back to its textual form. Callers that built
    /// a `Manifest` by hand (rather than via `from_xml_str`) should
    /// normalize project defaults first if they want a stable round trip.
    pub fn to_xml_string(&self) -> Result<String, ManifestError> {
        Ok(quick_xml::se::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<manifest>
  <import manifest="manifest" name="third_party" remote="https://example.com/third_party"/>
  <localimport file="local.xml"/>
  <project name="tools/jiri" path="tools/jiri" remote="https://example.com/jiri" remote-branch="master" revision="HEAD"/>
  <project name="third_party/rust" path="third_party/rust" remote="https://example.com/rust" revision="deadbeef"/>
  <hook name="go-generate" action="scripts/generate.sh" project="tools/jiri"/>
</manifest>"#;

    #[test]
    fn parses_all_four_collections() {
        let manifest = Manifest::from_xml_str(SAMPLE).unwrap();
        assert_eq!(manifest.imports.len(), 1);
        assert_eq!(manifest.local_imports.len(), 1);
        assert_eq!(manifest.projects.len(), 2);
        assert_eq!(manifest.hooks.len(), 1);
    }

    #[test]
    fn normalizes_default_spellings_on_parse() {
        let manifest = Manifest::from_xml_str(SAMPLE).unwrap();
        let jiri_project = manifest
            .projects
            .iter()
            .find(|p| p.name == "tools/jiri")
            .unwrap();
        assert_eq!(jiri_project.remote_branch, None);
        assert_eq!(jiri_project.revision, None);
    }

    #[test]
    fn round_trip_is_idempotent() {
        let manifest = Manifest::from_xml_str(SAMPLE).unwrap();
        let text = manifest.to_xml_string().unwrap();
        let reparsed = Manifest::from_xml_str(&text).unwrap();
        assert_eq!(manifest, reparsed);
    }
}
