// ⚙️ Configuration - defaults → TOML file → TALLY_* environment
//
// Env keys use `__` between sections and are lowercased:
//   TALLY_WRITE_PACING_MS=0
//   TALLY_WORKSPACES__CLASS_A__CHANNEL_ID=C0123   (workspace `class_a`)
// A workspace key is reachable from the environment only when it is
// lowercase without `-`; `class-a` can be set from the TOML file alone.

use crate::column::Column;
use crate::deduplication::DuplicateGroups;
use crate::error::{Result, TallyError};
use crate::parser::{NameExtractor, DEFAULT_KEYWORDS};
use crate::summary::{SummaryBuilder, DEFAULT_ABSENTEE_PREVIEW, DEFAULT_COMPLETION_TEMPLATE};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "tally.toml";
pub const ENV_PREFIX: &str = "TALLY_";
pub const MAX_WORKSPACE_NAME_LEN: usize = 50;

pub const DEFAULT_SHEET_NAME: &str = "출석현황";
pub const DEFAULT_ASSIGNMENT_SHEET_NAME: &str = "과제실습 모니터링";
pub const DEFAULT_THREAD_MESSAGE: &str =
    "@channel\n📢 Attendance thread is open.\n\nReply with \"Name/checked-in\".";

// ============================================================================
// TOP LEVEL
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TallyConfig {
    /// SQLite file holding schedules and run history
    #[serde(default = "default_database")]
    pub database: PathBuf,

    #[serde(default)]
    pub parser: ParserConfig,

    #[serde(default = "default_preview_limit")]
    pub absentee_preview_limit: usize,

    /// Pause between single-cell writes after a failed batch
    #[serde(default = "default_write_pacing_ms")]
    pub write_pacing_ms: u64,

    #[serde(default)]
    pub workspaces: BTreeMap<String, WorkspaceConfig>,
}

fn default_database() -> PathBuf {
    PathBuf::from("tally.db")
}

fn default_preview_limit() -> usize {
    DEFAULT_ABSENTEE_PREVIEW
}

fn default_write_pacing_ms() -> u64 {
    200
}

impl Default for TallyConfig {
    fn default() -> Self {
        TallyConfig {
            database: default_database(),
            parser: ParserConfig::default(),
            absentee_preview_limit: default_preview_limit(),
            write_pacing_ms: default_write_pacing_ms(),
            workspaces: BTreeMap::new(),
        }
    }
}

impl TallyConfig {
    /// Layer defaults, the TOML file (if it exists) and the environment
    pub fn figment(path: Option<&Path>) -> Figment {
        let path = path.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if path.exists() {
            figment = figment.merge(Toml::file(path));
        }

        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config: TallyConfig = Self::figment(path).extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for name in self.workspaces.keys() {
            validate_workspace_name(name)?;
        }
        Ok(())
    }

    pub fn workspace(&self, name: &str) -> Result<&WorkspaceConfig> {
        validate_workspace_name(name)?;
        self.workspaces
            .get(name)
            .ok_or_else(|| TallyError::WorkspaceNotFound(name.to_string()))
    }

    pub fn name_extractor(&self) -> Result<NameExtractor> {
        NameExtractor::with_keywords(&self.parser.keywords)
    }

    pub fn summary_builder(&self) -> SummaryBuilder {
        SummaryBuilder::new().with_preview_limit(self.absentee_preview_limit)
    }

    pub fn write_pacing(&self) -> Duration {
        Duration::from_millis(self.write_pacing_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParserConfig {
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,
}

fn default_keywords() -> Vec<String> {
    DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect()
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            keywords: default_keywords(),
        }
    }
}

// ============================================================================
// WORKSPACE
// ============================================================================

/// A column given either as letters ("C") or a 0-based index (2)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnRef {
    Index(usize),
    Letters(String),
}

impl ColumnRef {
    pub fn resolve(&self) -> Result<Column> {
        match self {
            ColumnRef::Index(i) => Ok(Column::from_index(*i)),
            ColumnRef::Letters(letters) => Column::parse(letters),
        }
    }
}

impl Default for ColumnRef {
    fn default() -> Self {
        ColumnRef::Index(1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default)]
    pub display_name: String,

    /// Channel where attendance threads live
    #[serde(default)]
    pub channel_id: String,

    /// Channel for submission threads; the attendance channel when unset
    #[serde(default)]
    pub assignment_channel_id: Option<String>,

    #[serde(default = "default_sheet_name")]
    pub sheet_name: String,

    #[serde(default = "default_assignment_sheet_name")]
    pub assignment_sheet_name: String,

    #[serde(default)]
    pub name_column: ColumnRef,

    /// First roster row, 0-based
    #[serde(default = "default_start_row")]
    pub start_row: usize,

    #[serde(default)]
    pub assignment_name_column: Option<ColumnRef>,

    #[serde(default)]
    pub assignment_start_row: Option<usize>,

    /// Direct-message recipient for reports
    #[serde(default)]
    pub notification_user_id: Option<String>,

    /// Write "X" for roster names with no reply
    #[serde(default = "default_true")]
    pub mark_absent: bool,

    #[serde(default)]
    pub duplicate_names: DuplicateGroups,

    #[serde(default = "default_thread_message")]
    pub thread_message: String,

    /// Thread reply after a check; `{present}`, `{absent}`, `{total}` are filled in
    #[serde(default = "default_completion_message")]
    pub completion_message: String,

    /// JSON chat export used as the chat source
    #[serde(default)]
    pub chat_export: Option<PathBuf>,

    /// Directory of `<sheet>.csv` files used as the spreadsheet
    #[serde(default)]
    pub sheet_dir: Option<PathBuf>,
}

fn default_sheet_name() -> String {
    DEFAULT_SHEET_NAME.to_string()
}

fn default_assignment_sheet_name() -> String {
    DEFAULT_ASSIGNMENT_SHEET_NAME.to_string()
}

fn default_start_row() -> usize {
    1
}

fn default_true() -> bool {
    true
}

fn default_thread_message() -> String {
    DEFAULT_THREAD_MESSAGE.to_string()
}

fn default_completion_message() -> String {
    DEFAULT_COMPLETION_TEMPLATE.to_string()
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        WorkspaceConfig {
            display_name: String::new(),
            channel_id: String::new(),
            assignment_channel_id: None,
            sheet_name: default_sheet_name(),
            assignment_sheet_name: default_assignment_sheet_name(),
            name_column: ColumnRef::default(),
            start_row: default_start_row(),
            assignment_name_column: None,
            assignment_start_row: None,
            notification_user_id: None,
            mark_absent: true,
            duplicate_names: DuplicateGroups::new(),
            thread_message: default_thread_message(),
            completion_message: default_completion_message(),
            chat_export: None,
            sheet_dir: None,
        }
    }
}

impl WorkspaceConfig {
    pub fn name_column(&self) -> Result<Column> {
        self.name_column.resolve()
    }

    pub fn assignment_channel(&self) -> &str {
        self.assignment_channel_id.as_deref().unwrap_or(&self.channel_id)
    }

    /// Falls back to the attendance name column
    pub fn assignment_name_column(&self) -> Result<Column> {
        match &self.assignment_name_column {
            Some(col) => col.resolve(),
            None => self.name_column(),
        }
    }

    pub fn assignment_start_row(&self) -> usize {
        self.assignment_start_row.unwrap_or(self.start_row)
    }

    pub fn label<'a>(&'a self, key: &'a str) -> &'a str {
        if self.display_name.trim().is_empty() {
            key
        } else {
            &self.display_name
        }
    }
}

/// Workspace names double as storage keys and file names
pub fn validate_workspace_name(name: &str) -> Result<()> {
    let invalid = name.trim().is_empty()
        || name.chars().count() > MAX_WORKSPACE_NAME_LEN
        || name.starts_with('.')
        || name.contains("..")
        || name.contains(['/', '\\', '\0']);

    if invalid {
        return Err(TallyError::InvalidWorkspaceName(name.to_string()));
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_workspace_name_validation() {
        assert!(validate_workspace_name("class-a").is_ok());
        assert!(validate_workspace_name("반_1").is_ok());

        for bad in ["", "  ", ".hidden", "a..b", "a/b", "a\\b", "nul\0", &"x".repeat(51)] {
            assert!(validate_workspace_name(bad).is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_defaults() {
        let config = TallyConfig::default();
        assert_eq!(config.absentee_preview_limit, 50);
        assert_eq!(config.write_pacing(), Duration::from_millis(200));
        assert!(config.parser.keywords.iter().any(|k| k == "출석"));

        let ws = WorkspaceConfig::default();
        assert!(ws.mark_absent);
        assert_eq!(ws.sheet_name, "출석현황");
        assert_eq!(ws.name_column().unwrap().letters(), "B");
    }

    #[test]
    fn test_column_ref_forms() {
        assert_eq!(ColumnRef::Index(2).resolve().unwrap().letters(), "C");
        assert_eq!(ColumnRef::Letters("c".into()).resolve().unwrap().letters(), "C");
        assert!(ColumnRef::Letters("3".into()).resolve().is_err());
    }

    #[test]
    fn test_assignment_fields_fall_back() {
        let ws = WorkspaceConfig {
            channel_id: "C1".into(),
            name_column: ColumnRef::Letters("D".into()),
            start_row: 4,
            ..WorkspaceConfig::default()
        };
        assert_eq!(ws.assignment_channel(), "C1");
        assert_eq!(ws.assignment_name_column().unwrap().letters(), "D");
        assert_eq!(ws.assignment_start_row(), 4);
        assert_eq!(ws.label("class-a"), "class-a");
    }

    #[test]
    fn test_toml_and_env_layering() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "tally.toml",
                r#"
                database = "data/tally.db"
                write_pacing_ms = 50

                [parser]
                keywords = ["here"]

                [workspaces.class-a]
                display_name = "Class A"
                channel_id = "C0123"
                name_column = "C"
                start_row = 3
                mark_absent = false

                [[workspaces.class-a.duplicate_names.Min]]
                author_id = "U10"
                resolved_name = "Min(A)"
                roster_row = 7
                "#,
            )?;
            jail.set_env("TALLY_WRITE_PACING_MS", "0");

            let config = TallyConfig::load(Some(Path::new("tally.toml"))).map_err(|e| e.to_string())?;
            assert_eq!(config.database, PathBuf::from("data/tally.db"));
            assert_eq!(config.write_pacing_ms, 0);
            assert_eq!(config.parser.keywords, vec!["here".to_string()]);

            let ws = config.workspace("class-a").map_err(|e| e.to_string())?;
            assert_eq!(ws.label("class-a"), "Class A");
            assert_eq!(ws.name_column().map_err(|e| e.to_string())?.letters(), "C");
            assert_eq!(ws.start_row, 3);
            assert!(!ws.mark_absent);
            assert_eq!(ws.duplicate_names["Min"][0].roster_row, 7);
            assert_eq!(ws.sheet_name, DEFAULT_SHEET_NAME);

            assert!(matches!(
                config.workspace("class-b"),
                Err(TallyError::WorkspaceNotFound(_))
            ));
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_reach_lowercase_workspace_keys() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "tally.toml",
                "[workspaces.class_a]\nchannel_id = \"C0123\"\n\n[workspaces.class-b]\nchannel_id = \"C0456\"\n",
            )?;
            jail.set_env("TALLY_WORKSPACES__CLASS_A__CHANNEL_ID", "C9999");
            jail.set_env("TALLY_WORKSPACES__CLASS_B__CHANNEL_ID", "C8888");

            let config = TallyConfig::load(None).map_err(|e| e.to_string())?;
            let class_a = config.workspace("class_a").map_err(|e| e.to_string())?;
            assert_eq!(class_a.channel_id, "C9999");

            // `class-b` is untouched; the override landed on a new `class_b` key
            let class_b = config.workspace("class-b").map_err(|e| e.to_string())?;
            assert_eq!(class_b.channel_id, "C0456");
            assert_eq!(config.workspaces["class_b"].channel_id, "C8888");
            Ok(())
        });
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        Jail::expect_with(|_jail| {
            let config = TallyConfig::load(None).map_err(|e| e.to_string())?;
            assert_eq!(config, TallyConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_invalid_workspace_key_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("tally.toml", "[workspaces.\"..evil\"]\nchannel_id = \"C1\"\n")?;
            let result = TallyConfig::load(None);
            assert!(matches!(result, Err(TallyError::InvalidWorkspaceName(_))));
            Ok(())
        });
    }
}
