use serde::{Deserialize, Deserializer, Serialize};

use crate::difficulty::Difficulty;

/// The player created at setup. Read-only for the length of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerProfile {
    pub name: String,
    #[serde(default, deserialize_with = "lenient_difficulty")]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub created_at: i64,
}

impl PlayerProfile {
    /// Returns `None` when the trimmed name is empty.
    pub fn new(name: &str, difficulty: Difficulty, created_at: i64) -> Option<Self> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            difficulty,
            created_at,
        })
    }
}

pub(crate) fn lenient_difficulty<'de, D>(deserializer: D) -> Result<Difficulty, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.map(|s| Difficulty::from_stored(&s)).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_trims_and_rejects_blank() {
        let p = PlayerProfile::new("  ada  ", Difficulty::Rush, 1).unwrap();
        assert_eq!(p.name, "ada");
        assert!(PlayerProfile::new("   ", Difficulty::Calm, 1).is_none());
    }

    #[test]
    fn test_reads_stored_shape() {
        let json = r#"{"name":"ada","difficulty":"calm","createdAt":1700000000000}"#;
        let p: PlayerProfile = serde_json::from_str(json).unwrap();
        assert_eq!(p.difficulty, Difficulty::Calm);
        assert_eq!(p.created_at, 1_700_000_000_000);
    }

    #[test]
    fn test_unknown_or_missing_difficulty_is_steady() {
        let p: PlayerProfile = serde_json::from_str(r#"{"name":"x","difficulty":"hard"}"#).unwrap();
        assert_eq!(p.difficulty, Difficulty::Steady);
        let p: PlayerProfile = serde_json::from_str(r#"{"name":"x","difficulty":null}"#).unwrap();
        assert_eq!(p.difficulty, Difficulty::Steady);
        let p: PlayerProfile = serde_json::from_str(r#"{"name":"x"}"#).unwrap();
        assert_eq!(p.difficulty, Difficulty::Steady);
    }

    #[test]
    fn test_serializes_camel_case() {
        let p = PlayerProfile::new("ada", Difficulty::Steady, 5).unwrap();
        let json = serde_json::to_string(&p).unwrap();
        assert!(json.contains("\"createdAt\":5"));
        assert!(json.contains("\"difficulty\":\"steady\""));
    }
}
