use std::process::ExitCode;

use clap::Parser;

use hubtest_cli::cli::{Cli, Commands};
use hubtest_cli::commands;
use hubtest_cli::error::{EXIT_CONFIG, process_exit_code};
use hubtest_cli::logging;
use hubtest_cli::output::OutputWriter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let (config_path, explicit) = cli.config_path();
    let config_path = config_path.to_path_buf();

    // 로깅 설정만 먼저 읽음; 설정 에러는 명령 실행 시 보고
    let mut general = commands::load_config(&config_path, explicit)
        .await
        .map(|config| config.general)
        .unwrap_or_default();
    if let Some(level) = &cli.log_level {
        general.log_level = level.clone();
    }
    if let Err(e) = logging::init_tracing(&general) {
        eprintln!("error: {e}");
        return ExitCode::from(process_exit_code(EXIT_CONFIG));
    }

    let writer = OutputWriter::new(cli.output);
    let result = match cli.command {
        Commands::Run(args) => commands::run::execute(args, &config_path, explicit, &writer).await,
        Commands::Config(args) => {
            commands::config::execute(args, &config_path, explicit, &writer)
                .await
                .map(|()| 0)
        }
        Commands::Env => commands::env::execute(&config_path, explicit, &writer)
            .await
            .map(|()| 0),
    };

    match result {
        Ok(code) => ExitCode::from(process_exit_code(code)),
        Err(e) => {
            tracing::debug!(error = ?e, "command failed");
            eprintln!("error: {e}");
            ExitCode::from(process_exit_code(e.exit_code()))
        }
    }
}
