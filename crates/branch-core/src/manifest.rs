//! Reader for the platform's brace-delimited key/value app manifests
//! (`appmanifest_<appid>.acf`).

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use time::PrimitiveDateTime;

const MAX_DEPTH: usize = 64;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("malformed manifest: {reason}")]
    Malformed { reason: String },
    #[error("read manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A field that was present but could not be decoded. Never fatal.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldIssue {
    pub field: &'static str,
    pub raw: String,
    pub reason: String,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ManifestRecord {
    pub app_id: u32,
    pub build_id: u64,
    pub name: String,
    pub state_flags: u32,
    pub last_updated_epoch: u64,
    pub install_dir: String,
    pub size_on_disk: u64,
    pub beta_key: Option<String>,
    pub issues: Vec<FieldIssue>,
}

impl ManifestRecord {
    /// Build id as recorded in the registry; `None` when unknown.
    pub fn build_id_string(&self) -> Option<String> {
        (self.build_id != 0).then(|| self.build_id.to_string())
    }

    pub fn last_updated(&self) -> Option<PrimitiveDateTime> {
        if self.last_updated_epoch == 0 {
            return None;
        }
        i64::try_from(self.last_updated_epoch)
            .ok()
            .and_then(crate::timestamp::from_unix)
    }

    /// StateFlags bit 4 marks a fully installed app.
    pub fn is_fully_installed(&self) -> bool {
        self.state_flags & 4 != 0
    }
}

pub fn manifest_file_name(app_id: u32) -> String {
    format!("appmanifest_{app_id}.acf")
}

pub fn manifest_path(library: &Path, app_id: u32) -> PathBuf {
    library.join("steamapps").join(manifest_file_name(app_id))
}

pub fn read_manifest(path: &Path) -> Result<ManifestRecord, ManifestError> {
    let bytes = fs::read(path).map_err(|source| ManifestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_manifest(&String::from_utf8_lossy(&bytes))
}

pub fn parse_manifest(text: &str) -> Result<ManifestRecord, ManifestError> {
    let tree = parse_tree(tokenize(text));
    let state = find_app_state(&tree).ok_or_else(|| ManifestError::Malformed {
        reason: "neither appid nor buildid present".to_string(),
    })?;

    let mut issues = Vec::new();
    let app_id = number_field(state, "appid", &mut issues);
    let build_id = number_field(state, "buildid", &mut issues);
    let state_flags = number_field(state, "StateFlags", &mut issues);
    let last_updated_epoch = number_field(state, "LastUpdated", &mut issues);
    let size_on_disk = number_field(state, "SizeOnDisk", &mut issues);
    let beta_key = ["UserConfig", "MountedConfig"]
        .into_iter()
        .filter_map(|block| find_block(state, block))
        .find_map(|block| find_text(block, "BetaKey"))
        .map(|key| key.to_string());

    Ok(ManifestRecord {
        app_id,
        build_id,
        name: find_text(state, "name").unwrap_or_default().to_string(),
        state_flags,
        last_updated_epoch,
        install_dir: find_text(state, "installdir").unwrap_or_default().to_string(),
        size_on_disk,
        beta_key,
        issues,
    })
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Open,
    Close,
    Text(String),
}

#[derive(Clone, Debug, PartialEq)]
enum KvValue {
    Text(String),
    Block(Vec<(String, KvValue)>),
}

type Entries = Vec<(String, KvValue)>;

fn is_blank(ch: char) -> bool {
    ch.is_whitespace() || ch == '\u{feff}'
}

fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            ch if is_blank(ch) => {}
            '{' => tokens.push(Token::Open),
            '}' => tokens.push(Token::Close),
            '"' => {
                let mut text = String::new();
                while let Some(ch) = chars.next() {
                    match ch {
                        '"' => break,
                        '\\' => match chars.next() {
                            Some('n') => text.push('\n'),
                            Some('t') => text.push('\t'),
                            Some(other) => text.push(other),
                            None => break,
                        },
                        other => text.push(other),
                    }
                }
                tokens.push(Token::Text(text));
            }
            '/' if chars.peek() == Some(&'/') => {
                for ch in chars.by_ref() {
                    if ch == '\n' {
                        break;
                    }
                }
            }
            other => {
                let mut text = String::from(other);
                while let Some(&next) = chars.peek() {
                    if is_blank(next) || matches!(next, '"' | '{' | '}') {
                        break;
                    }
                    text.push(next);
                    chars.next();
                }
                tokens.push(Token::Text(text));
            }
        }
    }
    tokens
}

/// Builds the key/value tree without recursion. Stray closes are ignored,
/// unterminated blocks are closed at end of input and nesting past
/// `MAX_DEPTH` is skipped.
fn parse_tree(tokens: Vec<Token>) -> Entries {
    let mut stack: Vec<(String, Entries)> = vec![(String::new(), Vec::new())];
    let mut pending_key: Option<String> = None;
    let mut skipped_depth = 0usize;

    for token in tokens {
        if skipped_depth > 0 {
            match token {
                Token::Open => skipped_depth += 1,
                Token::Close => skipped_depth -= 1,
                Token::Text(_) => {}
            }
            continue;
        }
        match token {
            Token::Text(text) => match pending_key.take() {
                None => pending_key = Some(text),
                Some(key) => {
                    if let Some((_, entries)) = stack.last_mut() {
                        entries.push((key, KvValue::Text(text)));
                    }
                }
            },
            Token::Open => {
                let key = pending_key.take().unwrap_or_default();
                if stack.len() > MAX_DEPTH {
                    skipped_depth = 1;
                } else {
                    stack.push((key, Vec::new()));
                }
            }
            Token::Close => {
                pending_key = None;
                close_block(&mut stack);
            }
        }
    }
    while stack.len() > 1 {
        close_block(&mut stack);
    }
    stack.pop().map(|(_, entries)| entries).unwrap_or_default()
}

fn close_block(stack: &mut Vec<(String, Entries)>) {
    if stack.len() < 2 {
        return;
    }
    if let Some((key, entries)) = stack.pop()
        && let Some((_, parent)) = stack.last_mut()
    {
        parent.push((key, KvValue::Block(entries)));
    }
}

fn find_text<'a>(entries: &'a [(String, KvValue)], key: &str) -> Option<&'a str> {
    entries.iter().find_map(|(name, value)| match value {
        KvValue::Text(text) if name.eq_ignore_ascii_case(key) => Some(text.as_str()),
        _ => None,
    })
}

fn find_block<'a>(entries: &'a [(String, KvValue)], key: &str) -> Option<&'a [(String, KvValue)]> {
    entries.iter().find_map(|(name, value)| match value {
        KvValue::Block(children) if name.eq_ignore_ascii_case(key) => Some(children.as_slice()),
        _ => None,
    })
}

fn has_identity(entries: &[(String, KvValue)]) -> bool {
    find_text(entries, "appid").is_some() || find_text(entries, "buildid").is_some()
}

/// Prefers the `AppState` block, otherwise the first block (breadth first)
/// carrying `appid` or `buildid`.
fn find_app_state(root: &[(String, KvValue)]) -> Option<&[(String, KvValue)]> {
    if let Some(state) = find_block(root, "AppState")
        && has_identity(state)
    {
        return Some(state);
    }
    let mut queue: std::collections::VecDeque<&[(String, KvValue)]> =
        std::collections::VecDeque::from([root]);
    while let Some(entries) = queue.pop_front() {
        if has_identity(entries) {
            return Some(entries);
        }
        for (_, value) in entries {
            if let KvValue::Block(children) = value {
                queue.push_back(children);
            }
        }
    }
    None
}

fn number_field<T>(entries: &[(String, KvValue)], field: &'static str, issues: &mut Vec<FieldIssue>) -> T
where
    T: FromStr + Default,
    T::Err: std::fmt::Display,
{
    let Some(raw) = find_text(entries, field) else {
        return T::default();
    };
    match raw.trim().parse::<T>() {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(field, raw, error = %err, "unreadable manifest field");
            issues.push(FieldIssue {
                field,
                raw: raw.to_string(),
                reason: err.to_string(),
            });
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SAMPLE: &str = "\u{feff}\"AppState\"\n{\n\t\"appid\"\t\t\"3164500\"\n\t\"Universe\"\t\t\"1\"\n\t\"name\"\t\t\"Schedule I\"\n\t\"StateFlags\"\t\t\"4\"\n\t\"installdir\"\t\t\"Schedule I\"\n\t\"LastUpdated\"\t\t\"1735689600\"\n\t\"SizeOnDisk\"\t\t\"6442450944\"\n\t\"buildid\"\t\t\"16982345\"\n\t\"InstalledDepots\"\n\t{\n\t\t\"3164501\"\n\t\t{\n\t\t\t\"manifest\"\t\t\"123\"\n\t\t}\n\t}\n\t\"UserConfig\"\n\t{\n\t\t\"language\"\t\t\"english\"\n\t\t\"BetaKey\"\t\t\"beta\"\n\t}\n}\n  \n";

    #[test]
    fn parses_typical_manifest() {
        let record = parse_manifest(SAMPLE).unwrap();
        assert_eq!(record.app_id, 3_164_500);
        assert_eq!(record.build_id, 16_982_345);
        assert_eq!(record.name, "Schedule I");
        assert_eq!(record.state_flags, 4);
        assert_eq!(record.last_updated_epoch, 1_735_689_600);
        assert_eq!(record.install_dir, "Schedule I");
        assert_eq!(record.size_on_disk, 6_442_450_944);
        assert_eq!(record.beta_key.as_deref(), Some("beta"));
        assert!(record.issues.is_empty());
        assert!(record.is_fully_installed());
    }

    #[test]
    fn tolerates_key_order_and_unknown_blocks() {
        let text = r#"
            "Other" { "nested" { "appid" "1" } }
            "AppState"
            {
                "buildid" "777"
                "Extra" { "deep" { "deeper" "x" } }
                "APPID" "42"
            }
        "#;
        let record = parse_manifest(text).unwrap();
        assert_eq!(record.app_id, 42);
        assert_eq!(record.build_id, 777);
        assert_eq!(record.name, "");
        assert_eq!(record.beta_key, None);
    }

    #[test]
    fn missing_one_required_field_defaults_it() {
        let record = parse_manifest(r#""AppState" { "buildid" "777" }"#).unwrap();
        assert_eq!(record.app_id, 0);
        assert_eq!(record.build_id, 777);
        assert_eq!(record.build_id_string().as_deref(), Some("777"));
    }

    #[test]
    fn missing_both_required_fields_is_malformed() {
        let err = parse_manifest(r#""AppState" { "name" "Game" }"#).unwrap_err();
        assert!(matches!(err, ManifestError::Malformed { .. }));
        assert!(matches!(
            parse_manifest("").unwrap_err(),
            ManifestError::Malformed { .. }
        ));
    }

    #[test]
    fn bad_numeric_field_is_reported_not_fatal() {
        let record =
            parse_manifest(r#""AppState" { "appid" "10" "buildid" "abc" "StateFlags" "-1" }"#)
                .unwrap();
        assert_eq!(record.app_id, 10);
        assert_eq!(record.build_id, 0);
        assert_eq!(record.build_id_string(), None);
        let fields: Vec<_> = record.issues.iter().map(|issue| issue.field).collect();
        assert_eq!(fields, vec!["buildid", "StateFlags"]);
    }

    #[test]
    fn truncated_input_closes_open_blocks() {
        let cut = SAMPLE.find("\"InstalledDepots\"").unwrap();
        let record = parse_manifest(&SAMPLE[..cut + 30]).unwrap();
        assert_eq!(record.build_id, 16_982_345);
        assert_eq!(record.beta_key, None);
    }

    #[test]
    fn handles_comments_escapes_and_unquoted_tokens() {
        let text = "// header\nAppState {\n appid 5 // trailing\n \"buildid\" \"9\"\n \"installdir\" \"C:\\\\Games\\\\\\\"x\\\"\"\n}";
        let record = parse_manifest(text).unwrap();
        assert_eq!(record.app_id, 5);
        assert_eq!(record.build_id, 9);
        assert_eq!(record.install_dir, "C:\\Games\\\"x\"");
    }

    #[test]
    fn deep_nesting_does_not_overflow() {
        let mut text = String::from("\"AppState\" { \"appid\" \"1\" \"buildid\" \"2\" ");
        text.push_str(&"\"k\" { ".repeat(10_000));
        let record = parse_manifest(&text).unwrap();
        assert_eq!(record.build_id, 2);
    }

    #[test]
    fn resolves_manifest_path() {
        let path = manifest_path(Path::new("/steam"), 480);
        assert_eq!(
            path,
            PathBuf::from("/steam")
                .join("steamapps")
                .join("appmanifest_480.acf")
        );
    }

    proptest! {
        #[test]
        fn never_panics_on_arbitrary_input(text in "\\PC*") {
            let _ = parse_manifest(&text);
        }

        #[test]
        fn never_panics_on_truncated_manifest(cut in 0usize..SAMPLE.len()) {
            if let Some(prefix) = SAMPLE.get(..cut) {
                let _ = parse_manifest(prefix);
            }
        }

        #[test]
        fn preserves_required_fields(app in 1u32..u32::MAX, build in 1u64..u64::MAX) {
            let text = format!("\"AppState\" {{ \"appid\" \"{app}\" \"buildid\" \"{build}\" }}");
            let record = parse_manifest(&text).unwrap();
            prop_assert_eq!(record.app_id, app);
            prop_assert_eq!(record.build_id, build);
        }
    }
}
