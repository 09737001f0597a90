mod cli;
mod logging;

fn main() -> anyhow::Result<()> {
    // Read before the runtime spawns its workers.
    branch_core::timestamp::init_local_offset();
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(cli::run())
}
