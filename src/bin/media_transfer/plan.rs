use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use media_transfer::transfer::{TransferGroup, validate_group};

use crate::config::Roots;

/// Transfer plan read from a TOML or JSON file.
#[derive(Debug, Default, Deserialize)]
pub struct TransferPlan {
    #[serde(default)]
    source: Option<PathBuf>,
    #[serde(default)]
    destination: Option<PathBuf>,
    #[serde(default)]
    subtitles: Option<PathBuf>,
    #[serde(default, rename = "group", alias = "groups")]
    pub(crate) groups: Vec<TransferGroup>,
}

impl TransferPlan {
    /// Read and validate a plan file.
    ///
    /// Files with a `.json` extension are parsed as JSON, everything else as TOML.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read plan file: {}", path.display()))?;
        let is_json = path
            .extension()
            .is_some_and(|extension| extension.eq_ignore_ascii_case("json"));
        let plan = if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
        .with_context(|| format!("Invalid plan file: {}", path.display()))?;
        Ok(plan)
    }

    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let plan: Self = toml::from_str(toml_str).map_err(|e| anyhow::anyhow!("Failed to parse plan: {e}"))?;
        plan.validate()?;
        Ok(plan)
    }

    pub fn from_json_str(json_str: &str) -> Result<Self> {
        let plan: Self = serde_json::from_str(json_str).context("Failed to parse plan")?;
        plan.validate()?;
        Ok(plan)
    }

    /// Roots given in the plan file.
    pub fn roots(&self) -> Roots {
        Roots {
            source: self.source.clone(),
            destination: self.destination.clone(),
            subtitles: self.subtitles.clone(),
        }
    }

    pub fn file_count(&self) -> usize {
        self.groups.iter().map(|group| group.files.len()).sum()
    }

    /// Group name, category and partition become directory names,
    /// so each has to be exactly one plain path component.
    fn validate(&self) -> Result<()> {
        for group in &self.groups {
            validate_group(group).with_context(|| format!("Invalid group '{}'", group.name))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod plan_tests {
    use super::*;

    use tempfile::tempdir;

    const SAMPLE_PLAN: &str = r#"
source = "/downloads"
destination = "/media"

[[group]]
name = "Alpha"
category = "Anime"
files = ["Alpha_E01.mkv", "Alpha_E02.mkv"]

[[group]]
name = "Beta"
category = "Korean archive"
partition = "Beta Season 1"
files = ["Beta_S01_E01.mkv"]
"#;

    #[test]
    fn parses_toml_plan() {
        let plan = TransferPlan::from_toml_str(SAMPLE_PLAN).expect("should parse plan");
        assert_eq!(plan.groups.len(), 2);
        assert_eq!(plan.file_count(), 3);
        assert_eq!(plan.groups[0].name, "Alpha");
        assert!(plan.groups[0].partition.is_none());
        assert_eq!(plan.groups[1].partition.as_deref(), Some("Beta Season 1"));

        let roots = plan.roots();
        assert_eq!(roots.source, Some(PathBuf::from("/downloads")));
        assert_eq!(roots.destination, Some(PathBuf::from("/media")));
        assert!(roots.subtitles.is_none());
    }

    #[test]
    fn parses_json_plan() {
        let json = r#"{
            "groups": [
                {"name": "Alpha", "category": "Anime", "files": ["Alpha_E01.mkv"]}
            ]
        }"#;
        let plan = TransferPlan::from_json_str(json).expect("should parse plan");
        assert_eq!(plan.groups.len(), 1);
        assert!(plan.roots().source.is_none());
    }

    #[test]
    fn empty_plan_has_no_groups() {
        let plan = TransferPlan::from_toml_str("").expect("should parse empty plan");
        assert!(plan.groups.is_empty());
        assert_eq!(plan.file_count(), 0);
    }

    #[test]
    fn rejects_path_like_group_fields() {
        for toml in [
            "[[group]]\nname = \"../Alpha\"\ncategory = \"Anime\"\n",
            "[[group]]\nname = \"Alpha\"\ncategory = \"Anime/Extra\"\n",
            "[[group]]\nname = \"Alpha\"\ncategory = \"\"\n",
            "[[group]]\nname = \"Alpha\"\ncategory = \"Anime\"\npartition = \"..\"\n",
        ] {
            assert!(TransferPlan::from_toml_str(toml).is_err(), "expected rejection:\n{toml}");
        }
    }

    #[test]
    fn missing_category_is_an_error() {
        assert!(TransferPlan::from_toml_str("[[group]]\nname = \"Alpha\"\n").is_err());
    }

    #[test]
    fn from_file_picks_format_by_extension() {
        let dir = tempdir().unwrap();
        let toml_path = dir.path().join("plan.toml");
        fs::write(&toml_path, SAMPLE_PLAN).unwrap();
        assert_eq!(TransferPlan::from_file(&toml_path).unwrap().groups.len(), 2);

        let json_path = dir.path().join("plan.JSON");
        fs::write(
            &json_path,
            r#"{"group": [{"name": "Gamma", "category": "Movies", "files": []}]}"#,
        )
        .unwrap();
        let plan = TransferPlan::from_file(&json_path).unwrap();
        assert_eq!(plan.groups[0].name, "Gamma");
    }

    #[test]
    fn from_file_missing_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(TransferPlan::from_file(&dir.path().join("missing.toml")).is_err());
    }
}
