use super::*;
pub(super) fn handle_launch_command(
    session: &Session,
    args: LaunchCommandArgs,
) -> anyhow::Result<()> {
    let store = session.open_store()?;
    let registry = BuildRegistry::new(&store);
    match args.command {
        LaunchCommandCommands::Get(args) => {
            match registry.custom_launch_command(args.branch)? {
                Some(command) => println!("{command}"),
                None => println!("No custom launch command for {}", args.branch),
            }
        }
        LaunchCommandCommands::Set(args) => {
            registry.set_custom_launch_command(args.branch, &args.command)?;
            if args.command.trim().is_empty() {
                println!("Cleared launch command for {}", args.branch);
            } else {
                println!("Launch command for {} saved", args.branch);
            }
        }
    }
    Ok(())
}
