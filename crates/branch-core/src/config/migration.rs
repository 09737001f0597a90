//! On-disk schema versions of the config file and the pure migrations
//! between them. `ConfigV3` is the current wire format.

use super::*;

pub(super) const CURRENT_VERSION: u32 = 3;

#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(super) struct ConfigV1 {
    #[serde(default)]
    pub(super) steam_library_path: String,
    #[serde(default)]
    pub(super) game_install_path: String,
    #[serde(default)]
    pub(super) managed_environment_path: String,
    #[serde(default)]
    pub(super) selected_branches: Vec<String>,
    #[serde(default)]
    pub(super) installed_branch: Option<String>,
    #[serde(default)]
    pub(super) build_ids: BTreeMap<String, String>,
    /// Not part of the original v1 layout; carried through when a hand-edited
    /// or mislabeled file has it.
    #[serde(default)]
    pub(super) custom_launch_commands: BTreeMap<String, String>,
    #[serde(default)]
    pub(super) last_updated: Option<String>,
}

/// Build ids stored as `[buildId, updatedTime]` arrays.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(super) struct ConfigV2 {
    #[serde(default)]
    pub(super) steam_library_path: String,
    #[serde(default)]
    pub(super) game_install_path: String,
    #[serde(default)]
    pub(super) managed_environment_path: String,
    #[serde(default)]
    pub(super) selected_branches: Vec<String>,
    #[serde(default)]
    pub(super) installed_branch: Option<String>,
    #[serde(default)]
    pub(super) branch_build_ids: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub(super) custom_launch_commands: BTreeMap<String, String>,
    #[serde(default)]
    pub(super) last_updated: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(super) struct BuildInfoV3 {
    pub(super) build_id: String,
    pub(super) updated_time: String,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(super) struct ConfigV3 {
    #[serde(default)]
    pub(super) steam_library_path: String,
    #[serde(default)]
    pub(super) game_install_path: String,
    #[serde(default)]
    pub(super) managed_environment_path: String,
    #[serde(default)]
    pub(super) selected_branches: Vec<String>,
    #[serde(default)]
    pub(super) installed_branch: Option<String>,
    #[serde(default)]
    pub(super) branch_build_ids: BTreeMap<String, BuildInfoV3>,
    #[serde(default)]
    pub(super) custom_launch_commands: BTreeMap<String, String>,
    #[serde(default)]
    pub(super) last_updated: Option<String>,
    #[serde(default)]
    pub(super) config_version: u32,
}

/// Build ids without timestamps inherit the file's own `lastUpdated`.
pub(super) fn migrate_v1(v1: ConfigV1) -> ConfigV2 {
    let stamp = v1.last_updated.clone().unwrap_or_default();
    ConfigV2 {
        steam_library_path: v1.steam_library_path,
        game_install_path: v1.game_install_path,
        managed_environment_path: v1.managed_environment_path,
        selected_branches: v1.selected_branches,
        installed_branch: v1.installed_branch,
        branch_build_ids: v1
            .build_ids
            .into_iter()
            .map(|(branch, build_id)| (branch, vec![build_id, stamp.clone()]))
            .collect(),
        custom_launch_commands: v1.custom_launch_commands,
        last_updated: v1.last_updated,
    }
}

pub(super) fn migrate_v2(v2: ConfigV2) -> ConfigV3 {
    let stamp = v2.last_updated.clone().unwrap_or_default();
    let mut branch_build_ids = BTreeMap::new();
    for (branch, entry) in v2.branch_build_ids {
        let mut values = entry.into_iter();
        let Some(build_id) = values.next() else {
            warn!(branch = %branch, "dropping empty build id entry during migration");
            continue;
        };
        let updated_time = values
            .next()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| stamp.clone());
        branch_build_ids.insert(
            branch,
            BuildInfoV3 {
                build_id,
                updated_time,
            },
        );
    }
    ConfigV3 {
        steam_library_path: v2.steam_library_path,
        game_install_path: v2.game_install_path,
        managed_environment_path: v2.managed_environment_path,
        selected_branches: v2.selected_branches,
        installed_branch: v2.installed_branch,
        branch_build_ids,
        custom_launch_commands: v2.custom_launch_commands,
        last_updated: v2.last_updated,
        config_version: CURRENT_VERSION,
    }
}

/// Reads `configVersion` as a number or a numeric string such as `"1.0"`.
/// Without the field the version is inferred from the build id shape.
pub(super) fn detect_version(json: &serde_json::Value) -> Result<u32, String> {
    let Some(value) = json.get("configVersion") else {
        return Ok(infer_version(json));
    };
    if let Some(number) = value.as_u64() {
        return u32::try_from(number).map_err(|_| format!("config version {number} out of range"));
    }
    if let Some(number) = value.as_f64() {
        if number.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&number) {
            return Ok(number as u32);
        }
        return Err(format!("unreadable config version {number}"));
    }
    if let Some(text) = value.as_str() {
        let major = text.trim().split('.').next().unwrap_or_default();
        return major
            .parse::<u32>()
            .map_err(|_| format!("unreadable config version `{text}`"));
    }
    if value.is_null() {
        return Ok(infer_version(json));
    }
    Err(format!("unreadable config version {value}"))
}

/// Only `buildIds` marks a v1 file. Without any build id entries the v2 and
/// v3 layouts are identical, so such files read as current.
fn infer_version(json: &serde_json::Value) -> u32 {
    if json.get("buildIds").is_some() {
        return 1;
    }
    let first_entry = json
        .get("branchBuildIds")
        .and_then(|ids| ids.as_object())
        .and_then(|ids| ids.values().next());
    match first_entry {
        Some(entry) if entry.is_array() => 2,
        Some(_) => CURRENT_VERSION,
        None if json.get("branchBuildIds").is_some()
            || json.get("customLaunchCommands").is_some() =>
        {
            CURRENT_VERSION
        }
        None => 1,
    }
}

/// Decodes any known version into the current wire format. The returned flag
/// is true when at least one migration ran. `fallback_stamp` fills a missing
/// `lastUpdated` before migrating so stamped build ids never use "now".
pub(super) fn decode(data: &str, fallback_stamp: &str) -> Result<(ConfigV3, bool), String> {
    let mut json: serde_json::Value =
        serde_json::from_str(data.trim_start_matches('\u{feff}')).map_err(|err| err.to_string())?;
    let version = detect_version(&json)?;
    match json.as_object_mut() {
        Some(root) => root.remove("configVersion"),
        None => return Err("config root is not an object".to_string()),
    };
    match version {
        CURRENT_VERSION => {
            let mut current: ConfigV3 =
                serde_json::from_value(json).map_err(|err| err.to_string())?;
            current.config_version = CURRENT_VERSION;
            Ok((current, false))
        }
        2 => {
            let mut v2: ConfigV2 = serde_json::from_value(json).map_err(|err| err.to_string())?;
            fill_stamp(&mut v2.last_updated, fallback_stamp);
            Ok((migrate_v2(v2), true))
        }
        0 | 1 => {
            let mut v1: ConfigV1 = serde_json::from_value(json).map_err(|err| err.to_string())?;
            fill_stamp(&mut v1.last_updated, fallback_stamp);
            Ok((migrate_v2(migrate_v1(v1)), true))
        }
        other => Err(format!(
            "config version {other} is newer than supported version {CURRENT_VERSION}"
        )),
    }
}

fn fill_stamp(last_updated: &mut Option<String>, fallback: &str) {
    let missing = last_updated
        .as_deref()
        .is_none_or(|value| value.trim().is_empty());
    if missing {
        *last_updated = Some(fallback.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v1_build_ids_keep_historical_stamp() {
        let v1 = ConfigV1 {
            build_ids: BTreeMap::from([("main-branch".to_string(), "500".to_string())]),
            last_updated: Some("2024-01-01T00:00:00".to_string()),
            ..ConfigV1::default()
        };
        let v3 = migrate_v2(migrate_v1(v1));
        assert_eq!(v3.config_version, CURRENT_VERSION);
        assert_eq!(
            v3.branch_build_ids.get("main-branch"),
            Some(&BuildInfoV3 {
                build_id: "500".to_string(),
                updated_time: "2024-01-01T00:00:00".to_string(),
            })
        );
    }

    #[test]
    fn v2_arrays_become_records() {
        let v2 = ConfigV2 {
            branch_build_ids: BTreeMap::from([
                (
                    "beta-branch".to_string(),
                    vec!["42".to_string(), "2023-05-06T07:08:09".to_string()],
                ),
                ("main-branch".to_string(), vec!["7".to_string()]),
                ("alternate-branch".to_string(), Vec::new()),
            ]),
            custom_launch_commands: BTreeMap::from([(
                "beta-branch".to_string(),
                "--debug".to_string(),
            )]),
            last_updated: Some("2023-06-01T00:00:00".to_string()),
            ..ConfigV2::default()
        };
        let v3 = migrate_v2(v2);
        assert_eq!(v3.branch_build_ids.len(), 2);
        assert_eq!(
            v3.branch_build_ids["beta-branch"].updated_time,
            "2023-05-06T07:08:09"
        );
        assert_eq!(
            v3.branch_build_ids["main-branch"].updated_time,
            "2023-06-01T00:00:00"
        );
        assert_eq!(v3.custom_launch_commands["beta-branch"], "--debug");
    }

    #[test]
    fn detects_versions() {
        assert_eq!(detect_version(&serde_json::json!({})), Ok(1));
        assert_eq!(
            detect_version(&serde_json::json!({"branchBuildIds": {"main-branch": ["1"]}})),
            Ok(2)
        );
        assert_eq!(detect_version(&serde_json::json!({"configVersion": 2})), Ok(2));
        assert_eq!(
            detect_version(&serde_json::json!({"configVersion": "1.0"})),
            Ok(1)
        );
        assert!(detect_version(&serde_json::json!({"configVersion": "x"})).is_err());
        assert_eq!(
            detect_version(&serde_json::json!({"buildIds": {}, "customLaunchCommands": {}})),
            Ok(1)
        );
    }

    #[test]
    fn whole_float_versions_are_accepted() {
        assert_eq!(detect_version(&serde_json::json!({"configVersion": 3.0})), Ok(3));
        assert!(detect_version(&serde_json::json!({"configVersion": 2.5})).is_err());
        assert!(detect_version(&serde_json::json!({"configVersion": -1.0})).is_err());

        let data = r#"{"configVersion": 2.0, "branchBuildIds": {"main-branch": ["5", "2024-01-01T00:00:00"]}}"#;
        let (v3, migrated) = decode(data, "").unwrap();
        assert!(migrated);
        assert_eq!(v3.branch_build_ids["main-branch"].build_id, "5");
        assert_eq!(
            v3.branch_build_ids["main-branch"].updated_time,
            "2024-01-01T00:00:00"
        );
    }

    #[test]
    fn unversioned_file_without_builds_keeps_launch_commands() {
        let data = r#"{"customLaunchCommands": {"beta-branch": "-batchmode"}, "lastUpdated": "2024-01-01T00:00:00"}"#;
        let (v3, migrated) = decode(data, "").unwrap();
        assert!(!migrated);
        assert_eq!(v3.custom_launch_commands["beta-branch"], "-batchmode");

        let data = r#"{"configVersion": 1, "buildIds": {"main-branch": "4"}, "customLaunchCommands": {"main-branch": "-x"}}"#;
        let (v3, migrated) = decode(data, "2024-01-01T00:00:00").unwrap();
        assert!(migrated);
        assert_eq!(v3.custom_launch_commands["main-branch"], "-x");
        assert_eq!(v3.branch_build_ids["main-branch"].build_id, "4");
    }

    #[test]
    fn decode_fills_missing_stamp_from_fallback() {
        let data = r#"{"buildIds": {"main-branch": "9"}}"#;
        let (v3, migrated) = decode(data, "2022-02-02T02:02:02").unwrap();
        assert!(migrated);
        assert_eq!(
            v3.branch_build_ids["main-branch"].updated_time,
            "2022-02-02T02:02:02"
        );
    }

    #[test]
    fn decode_rejects_future_versions_and_garbage() {
        assert!(decode(r#"{"configVersion": 9}"#, "").is_err());
        assert!(decode("not json", "").is_err());
        assert!(decode("[1, 2]", "").is_err());
    }

    #[test]
    fn migrating_current_is_a_no_op() {
        let data = r#"{"configVersion": 3, "branchBuildIds": {"main-branch": {"buildId": "1", "updatedTime": "2024-01-01T00:00:00"}}}"#;
        let (v3, migrated) = decode(data, "").unwrap();
        assert!(!migrated);
        let reencoded = serde_json::to_string(&v3).unwrap();
        let (again, migrated) = decode(&reencoded, "").unwrap();
        assert!(!migrated);
        assert_eq!(again, v3);
    }
}
