use super::*;
pub async fn run() -> anyhow::Result<()> {
    let log_buffer = logging::LogBuffer::new(200);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error"));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_filter(filter),
        )
        .with(logging::LogLayer::new(log_buffer.clone()).with_filter(LevelFilter::WARN))
        .init();

    let cli = Cli::parse();
    info!(command = command_label(&cli.command), "Running command");
    let session = Session::from_cli(&cli)?;

    match cli.command {
        Commands::Status(args) => handle_status(session, args, &log_buffer).await,
        Commands::Install(args) => {
            handle_transfer(
                session,
                TransferKind::Install,
                args.branch,
                args.allow_branch_mismatch,
            )
            .await
        }
        Commands::Update(args) => {
            handle_transfer(
                session,
                TransferKind::Update,
                args.branch,
                args.allow_branch_mismatch,
            )
            .await
        }
        Commands::Delete(args) => {
            handle_transfer(session, TransferKind::Delete, args.branch, false).await
        }
        Commands::Config(args) => handle_config(&session, args),
        Commands::LaunchCommand(args) => handle_launch_command(&session, args),
        Commands::Manifest(args) => handle_manifest(&session, args),
    }
}

pub(super) fn command_label(command: &Commands) -> &'static str {
    match command {
        Commands::Status(_) => "status",
        Commands::Install(_) => "install",
        Commands::Update(_) => "update",
        Commands::Delete(_) => "delete",
        Commands::Config(_) => "config",
        Commands::LaunchCommand(_) => "launch-command",
        Commands::Manifest(_) => "manifest",
    }
}
