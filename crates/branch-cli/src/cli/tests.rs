use super::config_cmd::render_config;
use super::manifest_cmd::render_manifest;
use super::shared::render_progress_bar;
use super::*;
use branch_core::manifest::parse_manifest;
use std::fs;
use tempfile::TempDir;

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(args).unwrap()
}

#[test]
fn status_accepts_repeated_branches_and_steam_keys() {
    let cli = parse(&[
        "branch-sync",
        "status",
        "--branch",
        "main-branch",
        "--branch",
        "beta",
        "--json",
    ]);
    match cli.command {
        Commands::Status(args) => {
            assert_eq!(
                args.branches,
                vec![BranchKind::MainBranch, BranchKind::BetaBranch]
            );
            assert!(args.json);
        }
        _ => panic!("expected status command"),
    }
}

#[test]
fn unknown_branch_is_rejected() {
    assert!(Cli::try_parse_from(["branch-sync", "install", "nightly"]).is_err());
}

#[test]
fn global_flags_apply_after_subcommand() {
    let cli = parse(&[
        "branch-sync",
        "update",
        "alternate-branch",
        "--allow-branch-mismatch",
        "--config",
        "/tmp/cfg.json",
        "--app-id",
        "42",
        "--executable",
        "Game.exe",
    ]);
    assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("/tmp/cfg.json")));
    let session = Session::from_cli(&cli).unwrap();
    assert_eq!(session.profile.app_id, 42);
    assert_eq!(session.profile.executable_name, "Game.exe");
    assert_eq!(session.profile.mods_dir, "Mods");
    match cli.command {
        Commands::Update(args) => {
            assert_eq!(args.branch, BranchKind::AlternateBranch);
            assert!(args.allow_branch_mismatch);
        }
        _ => panic!("expected update command"),
    }
}

#[test]
fn launch_command_set_accepts_leading_hyphen() {
    let cli = parse(&["branch-sync", "launch-command", "set", "beta-branch", "-batchmode"]);
    match cli.command {
        Commands::LaunchCommand(LaunchCommandArgs {
            command: LaunchCommandCommands::Set(args),
        }) => {
            assert_eq!(args.branch, BranchKind::BetaBranch);
            assert_eq!(args.command, "-batchmode");
        }
        _ => panic!("expected launch-command set"),
    }

    let cli = parse(&["branch-sync", "launch-command", "set", "beta-branch"]);
    match cli.command {
        Commands::LaunchCommand(LaunchCommandArgs {
            command: LaunchCommandCommands::Set(args),
        }) => assert!(args.command.is_empty()),
        _ => panic!("expected launch-command set"),
    }
}

#[test]
fn config_select_requires_a_branch() {
    assert!(Cli::try_parse_from(["branch-sync", "config", "select"]).is_err());
    let cli = parse(&["branch-sync", "config", "installed"]);
    match cli.command {
        Commands::Config(ConfigArgs {
            command: ConfigCommands::Installed(args),
        }) => assert_eq!(args.branch, None),
        _ => panic!("expected config installed"),
    }
}

#[test]
fn corrupt_config_suggests_reset() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("config.json");
    fs::write(&path, "{ not json").unwrap();
    let session = Session {
        config_path: path.clone(),
        profile: GameProfile::default(),
    };
    let err = session.open_store().unwrap_err();
    assert!(format!("{err:#}").contains("config reset"));
    assert_eq!(fs::read_to_string(&path).unwrap(), "{ not json");
}

#[test]
fn status_table_marks_current_branch_and_errors() {
    let info = BranchInfo {
        branch: BranchKind::MainBranch,
        display_name: "Main".to_string(),
        folder_path: PathBuf::from("/managed/main-branch"),
        executable_path: PathBuf::from("/managed/main-branch/Game.exe"),
        mods_dll_count: 2,
        directory_size: 2048,
        file_count: 7,
        last_modified: None,
        local_build_id: "100".to_string(),
        steam_build_id: "101".to_string(),
        status: BranchStatus::UpdateAvailable,
        status_detail: None,
        is_current_steam_branch: true,
    };
    let results = vec![
        (BranchKind::MainBranch, Ok(info)),
        (
            BranchKind::BetaBranch,
            Err(StatusError::BranchBusy(BranchKind::BetaBranch)),
        ),
    ];
    let rows = status_rows(&results);
    assert_eq!(rows[1].status, "busy");

    let table = render_status_table(&rows);
    let lines: Vec<&str> = table.lines().collect();
    assert!(lines[0].contains("BRANCH"));
    assert!(lines[1].starts_with("* main-branch"));
    assert!(lines[1].contains("update_available"));
    assert!(lines[1].contains("2.0 KiB"));
    assert!(lines[2].starts_with("  beta-branch"));
    assert!(lines[3].starts_with("beta-branch: branch beta-branch is busy"));

    let json = serde_json::to_value(&rows).unwrap();
    assert_eq!(json[0]["localBuildId"], "100");
    assert_eq!(json[0]["current"], true);
}

#[test]
fn sizes_and_progress_bars() {
    assert_eq!(format_size(512), "512 B");
    assert_eq!(format_size(1536), "1.5 KiB");
    assert_eq!(format_size(5 * 1024 * 1024 * 1024), "5.0 GiB");
    assert_eq!(render_progress_bar(0, 0, 10), "[]");
    assert_eq!(render_progress_bar(1, 2, 4), "[##--]");
}

#[test]
fn outcome_summary_names_partial_directory() {
    let outcome = TransferOutcome::Cancelled {
        files_completed: 2,
        total_files: 5,
        partial_dir: Some(PathBuf::from("Game_Data")),
    };
    let summary = outcome_summary(BranchKind::BetaBranch, &outcome);
    assert!(summary.contains("2/5"));
    assert!(summary.contains("Game_Data"));
}

#[test]
fn manifest_rendering_shows_branch_and_issues() {
    let record = parse_manifest(
        r#""AppState" { "appid" "7" "name" "Game" "buildid" "88" "SizeOnDisk" "huge"
            "UserConfig" { "BetaKey" "beta" } }"#,
    )
    .unwrap();
    let rendered = render_manifest(&record);
    assert!(rendered.contains("build id:       88"));
    assert!(rendered.contains("branch:         beta-branch"));
    assert!(rendered.contains("issue: SizeOnDisk"));
}

#[test]
fn config_rendering_lists_builds() {
    let tmp = TempDir::new().unwrap();
    let store = ConfigStore::open(&tmp.path().join("config.json")).unwrap();
    store.set_selected_branches([BranchKind::BetaBranch]).unwrap();
    BuildRegistry::new(&store)
        .set_build_id(BranchKind::BetaBranch, "77", None)
        .unwrap();
    let rendered = render_config(&store.snapshot().unwrap());
    assert!(rendered.contains("selected branches: beta-branch"));
    assert!(rendered.contains("  beta-branch: 77 ("));
    assert!(rendered.contains("managed env:       -"));
}
