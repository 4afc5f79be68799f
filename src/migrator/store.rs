//! Member collection store - the JSON file holding member records

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tempfile::NamedTempFile;

use super::{MigrateError, Result};

/// A single member record.
///
/// Kept as a raw JSON object so fields this tool does not know about survive
/// a rewrite untouched and in their original order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Member(Map<String, Value>);

impl Member {
    /// Unique identifier rendered as a string (numbers and strings both allowed)
    pub fn id(&self) -> String {
        match self.0.get("id") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.0.get("name").and_then(Value::as_str).unwrap_or_default()
    }

    /// Image reference; missing or non-string values read as empty
    pub fn image(&self) -> &str {
        self.0.get("image").and_then(Value::as_str).unwrap_or_default()
    }

    pub fn set_image(&mut self, image: impl Into<String>) {
        self.0.insert("image".to_string(), Value::String(image.into()));
    }

    fn validate(&self, index: usize) -> Result<()> {
        match self.0.get("id") {
            Some(Value::String(s)) if !s.is_empty() => {}
            Some(Value::Number(_)) => {}
            _ => {
                return Err(MigrateError::Config(format!(
                    "member #{index} has no usable \"id\" field"
                )));
            }
        }

        if !matches!(self.0.get("name"), Some(Value::String(_))) {
            return Err(MigrateError::Config(format!(
                "member #{index} ({}) has no \"name\" field",
                self.id()
            )));
        }

        Ok(())
    }
}

impl TryFrom<Value> for Member {
    type Error = MigrateError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(MigrateError::Config(format!(
                "member record must be an object, got {other}"
            ))),
        }
    }
}

/// The ordered member list backed by one JSON file
#[derive(Debug)]
pub struct MemberCollection {
    path: PathBuf,
    members: Vec<Member>,
}

impl MemberCollection {
    /// Load the collection, failing before any mutation if the file is
    /// missing, unreadable, or not an array of member records
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if !path.is_file() {
            return Err(MigrateError::Config(format!(
                "Could not find members file at {}",
                path.display()
            )));
        }

        let raw = fs::read_to_string(&path).map_err(|e| {
            MigrateError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;

        let value: Value = serde_json::from_str(&raw).map_err(|e| {
            MigrateError::Config(format!("{} is not valid JSON: {e}", path.display()))
        })?;

        let Value::Array(entries) = value else {
            return Err(MigrateError::Config(format!(
                "{} must hold a JSON array of members",
                path.display()
            )));
        };

        let members = entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                let member = Member::try_from(entry)?;
                member.validate(index)?;
                Ok(member)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { path, members })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn members_mut(&mut self) -> &mut [Member] {
        &mut self.members
    }

    /// Write the whole collection back with 2-space indentation.
    ///
    /// The JSON goes to a temp file next to the target and is then renamed
    /// over it, so readers never see a half-written collection.
    pub fn save(&self) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));

        let mut json = serde_json::to_vec_pretty(&self.members)?;
        json.push(b'\n');

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;

        // Keep the original file mode rather than the temp file's 0600
        if let Ok(meta) = fs::metadata(&self.path) {
            fs::set_permissions(tmp.path(), meta.permissions())?;
        }

        tmp.persist(&self.path).map_err(|e| MigrateError::Io(e.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write_members(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("members.json");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_members() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_members(
            dir.path(),
            r#"[
  {"id": 1, "name": "Ada", "image": "https://drive.google.com/uc?id=Q1"},
  {"id": "cs-02", "name": "Lin", "batch": "2027"}
]"#,
        );

        let collection = MemberCollection::load(&path).unwrap();
        assert_eq!(collection.len(), 2);

        let members = collection.members();
        assert_eq!(members[0].id(), "1");
        assert_eq!(members[0].name(), "Ada");
        assert_eq!(members[0].image(), "https://drive.google.com/uc?id=Q1");
        assert_eq!(members[1].id(), "cs-02");
        assert_eq!(members[1].image(), "");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = MemberCollection::load(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, MigrateError::Config(_)));
    }

    #[test]
    fn test_load_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_members(dir.path(), "[{\"id\": 1,");
        let err = MemberCollection::load(&path).unwrap_err();
        assert!(matches!(err, MigrateError::Config(_)));
    }

    #[test]
    fn test_load_rejects_non_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_members(dir.path(), r#"{"id": 1, "name": "Ada"}"#);
        assert!(matches!(
            MemberCollection::load(&path).unwrap_err(),
            MigrateError::Config(_)
        ));
    }

    #[test]
    fn test_load_requires_id_and_name() {
        let dir = tempfile::tempdir().unwrap();

        let path = write_members(dir.path(), r#"[{"name": "Ada", "image": ""}]"#);
        assert!(matches!(
            MemberCollection::load(&path).unwrap_err(),
            MigrateError::Config(_)
        ));

        let path = write_members(dir.path(), r#"[{"id": 3, "image": ""}]"#);
        assert!(matches!(
            MemberCollection::load(&path).unwrap_err(),
            MigrateError::Config(_)
        ));

        let path = write_members(dir.path(), r#"["just a string"]"#);
        assert!(matches!(
            MemberCollection::load(&path).unwrap_err(),
            MigrateError::Config(_)
        ));
    }

    #[test]
    fn test_save_keeps_field_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_members(
            dir.path(),
            r#"[{"name": "Ada", "image": "x", "id": 1, "domain": "CV"}]"#,
        );

        let mut collection = MemberCollection::load(&path).unwrap();
        collection.members_mut()[0].set_image("/members/1.jpg");
        collection.save().unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(
            written,
            "[\n  {\n    \"name\": \"Ada\",\n    \"image\": \"/members/1.jpg\",\n    \"id\": 1,\n    \"domain\": \"CV\"\n  }\n]\n"
        );
    }

    #[test]
    fn test_save_keeps_large_numbers_exact() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_members(
            dir.path(),
            r#"[
  {"id": 123456789012345678901234, "name": "Ada", "image": "x", "phone": 98765432109876543210987, "score": 0.1}
]"#,
        );

        let mut collection = MemberCollection::load(&path).unwrap();
        assert_eq!(collection.members()[0].id(), "123456789012345678901234");

        collection.members_mut()[0].set_image("/members/1.jpg");
        collection.save().unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"id\": 123456789012345678901234,"));
        assert!(written.contains("\"phone\": 98765432109876543210987,"));
        assert!(written.contains("\"score\": 0.1"));
    }

    #[test]
    fn test_set_image_adds_missing_field() {
        let mut member = Member::try_from(json!({"id": 9, "name": "Kai"})).unwrap();
        member.set_image("/members/9.jpg");
        assert_eq!(member.image(), "/members/9.jpg");
    }
}
