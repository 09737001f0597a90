use super::*;
#[derive(Parser)]
#[command(name = "branch-sync", author, version, about)]
pub(super) struct Cli {
    #[arg(long, global = true, help = "Config file to use instead of the default location")]
    pub(super) config: Option<PathBuf>,
    #[arg(long, global = true, help = "Steam app id of the managed game")]
    pub(super) app_id: Option<u32>,
    #[arg(
        long,
        global = true,
        help = "Executable file name that marks a branch as installed"
    )]
    pub(super) executable: Option<String>,
    #[command(subcommand)]
    pub(super) command: Commands,
}

#[derive(clap::Subcommand)]
pub(super) enum Commands {
    #[command(about = "Show the status of every managed branch")]
    Status(StatusArgs),
    #[command(about = "Copy the current game install into a branch folder")]
    Install(TransferArgs),
    #[command(about = "Refresh a branch folder from the current game install")]
    Update(TransferArgs),
    #[command(about = "Delete a branch folder")]
    Delete(BranchArg),
    #[command(about = "Manage config")]
    Config(ConfigArgs),
    #[command(about = "Read or change a branch's custom launch command")]
    LaunchCommand(LaunchCommandArgs),
    #[command(about = "Inspect the platform app manifest")]
    Manifest(ManifestArgs),
}

#[derive(Parser)]
pub(super) struct StatusArgs {
    #[arg(long = "branch", help = "Limit the refresh to these branches")]
    pub(super) branches: Vec<BranchKind>,
    #[arg(long, help = "Print JSON instead of a table")]
    pub(super) json: bool,
}

#[derive(Parser)]
pub(super) struct TransferArgs {
    pub(super) branch: BranchKind,
    #[arg(
        long,
        help = "Copy even when Steam has a different branch installed"
    )]
    pub(super) allow_branch_mismatch: bool,
}

#[derive(Parser)]
pub(super) struct BranchArg {
    pub(super) branch: BranchKind,
}

#[derive(Parser)]
pub(super) struct ConfigArgs {
    #[command(subcommand)]
    pub(super) command: ConfigCommands,
}

#[derive(clap::Subcommand)]
pub(super) enum ConfigCommands {
    #[command(about = "Create the config or update its paths")]
    Init(InitArgs),
    #[command(about = "Print the current config")]
    Show,
    #[command(about = "Move the current config aside and start from defaults")]
    Reset,
    #[command(about = "Choose which branches are managed")]
    Select(SelectArgs),
    #[command(about = "Record which branch Steam currently has installed")]
    Installed(InstalledArgs),
}

#[derive(Parser)]
pub(super) struct InitArgs {
    #[arg(long)]
    pub(super) steam_library: Option<PathBuf>,
    #[arg(long)]
    pub(super) game_install: Option<PathBuf>,
    #[arg(long)]
    pub(super) managed_env: Option<PathBuf>,
}

#[derive(Parser)]
pub(super) struct SelectArgs {
    #[arg(required = true)]
    pub(super) branches: Vec<BranchKind>,
}

#[derive(Parser)]
pub(super) struct InstalledArgs {
    #[arg(help = "Branch name; omit to clear")]
    pub(super) branch: Option<BranchKind>,
}

#[derive(Parser)]
pub(super) struct LaunchCommandArgs {
    #[command(subcommand)]
    pub(super) command: LaunchCommandCommands,
}

#[derive(clap::Subcommand)]
pub(super) enum LaunchCommandCommands {
    Get(BranchArg),
    Set(SetLaunchCommandArgs),
}

#[derive(Parser)]
pub(super) struct SetLaunchCommandArgs {
    pub(super) branch: BranchKind,
    #[arg(allow_hyphen_values = true, default_value = "")]
    pub(super) command: String,
}

#[derive(Parser)]
pub(super) struct ManifestArgs {
    #[command(subcommand)]
    pub(super) command: ManifestCommands,
}

#[derive(clap::Subcommand)]
pub(super) enum ManifestCommands {
    #[command(about = "Parse the app manifest and compare it with branch copies")]
    Show(ManifestShowArgs),
}

#[derive(Parser)]
pub(super) struct ManifestShowArgs {
    #[arg(long, help = "Read this manifest file instead of the configured library")]
    pub(super) path: Option<PathBuf>,
}
