// src/main.rs

use mesos_executor::{ExitReason, cli, logging, run};

#[tokio::main]
async fn main() {
    match run_main().await {
        // The agent treats any executor exit as the end of the task group.
        Ok(ExitReason::Finished) => std::process::exit(1),
        Ok(ExitReason::Cancelled) => {}
        Err(err) => {
            eprintln!("mesos-executor error: {err:?}");
            std::process::exit(1);
        }
    }
}

async fn run_main() -> anyhow::Result<ExitReason> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    run(args).await
}
