use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::{DependencyReference, PackageReference};

/// Package metadata as published by the catalog.
///
/// Immutable once created; identity is `(id, version)`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PackageMeta {
    pub id: String,
    pub version: Version,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    /// Only one version of a unitary package may be installed at a time.
    #[serde(default)]
    pub unitary: bool,
    #[serde(default)]
    pub dependencies: Vec<DependencyReference>,
    #[serde(default)]
    pub conflicts_with: Vec<DependencyReference>,
    #[serde(rename = "installer_ref")]
    pub installer: String,
    #[serde(rename = "configurator_ref")]
    pub configurator: String,
    #[serde(
        rename = "preprocessor_ref",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub preprocessor: Option<String>,
    /// Free-form metadata consumed by plugins (e.g. `bin` link patterns).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl PackageMeta {
    /// Create metadata with the given identity and plugin references, and no dependencies.
    pub fn new(
        id: impl Into<String>,
        version: Version,
        installer: impl Into<String>,
        configurator: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            version,
            release_date: None,
            unitary: false,
            dependencies: vec![],
            conflicts_with: vec![],
            installer: installer.into(),
            configurator: configurator.into(),
            preprocessor: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Pointer to this exact package.
    pub fn reference(&self) -> PackageReference {
        PackageReference::new(self.id.clone(), self.version.clone())
    }

    /// Whether `(id, version)` matches this package's identity.
    pub fn is(&self, id: &str, version: &Version) -> bool {
        self.id == id && &self.version == version
    }

    /// Whether any declared dependency names `id`.
    pub fn depends_on(&self, id: &str) -> bool {
        self.dependencies.iter().any(|d| d.package_id == id)
    }

    /// Read a list of strings from the free-form metadata.
    pub fn metadata_strings(&self, key: &str) -> Option<Vec<String>> {
        let values = self.metadata.get(key)?.as_array()?;
        Some(
            values
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
        )
    }
}

impl fmt::Display for PackageMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_deserializes_plugin_refs() {
        let json = r#"{
            "id": "tool",
            "version": "1.2.0",
            "installer_ref": "archive",
            "configurator_ref": "bin-links",
            "preprocessor_ref": "flatten",
            "dependencies": [{ "package_id": "runtime", "version_range": ">=1.0.0 <2.0.0" }]
        }"#;
        let meta: PackageMeta = serde_json::from_str(json).unwrap();

        assert_eq!(meta.id, "tool");
        assert_eq!(meta.installer, "archive");
        assert_eq!(meta.configurator, "bin-links");
        assert_eq!(meta.preprocessor.as_deref(), Some("flatten"));
        assert!(!meta.unitary);
        assert!(meta.conflicts_with.is_empty());
        assert!(meta.depends_on("runtime"));
        assert!(!meta.depends_on("tool"));
    }

    #[test]
    fn test_meta_serialization_omits_empty_optionals() {
        let meta = PackageMeta::new("tool", Version::new(1, 0, 0), "archive", "none");
        let json = serde_json::to_string(&meta).unwrap();

        assert!(!json.contains("preprocessor_ref"));
        assert!(!json.contains("release_date"));
        assert!(json.contains(r#""installer_ref":"archive""#));
        let back: PackageMeta = serde_json::from_str(&json).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn test_meta_display_and_identity() {
        let meta = PackageMeta::new("tool", Version::new(0, 3, 1), "file", "none");
        assert_eq!(meta.to_string(), "tool@0.3.1");
        assert!(meta.is("tool", &Version::new(0, 3, 1)));
        assert!(!meta.is("tool", &Version::new(0, 3, 2)));
        assert!(meta.reference().points_to(&meta));
    }

    #[test]
    fn test_metadata_strings() {
        let mut meta = PackageMeta::new("tool", Version::new(1, 0, 0), "archive", "bin-links");
        meta.metadata.insert(
            "bin".into(),
            serde_json::json!(["bin/tool", "scripts/*.sh", 3]),
        );

        assert_eq!(
            meta.metadata_strings("bin"),
            Some(vec!["bin/tool".to_string(), "scripts/*.sh".to_string()])
        );
        assert_eq!(meta.metadata_strings("missing"), None);
    }
}
