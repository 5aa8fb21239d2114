// src/commands/services.rs

use anyhow::Result;
use clap::Subcommand;
use pc_toolkit::{
    config::AppConfig,
    constants::SERVICE_COMMAND_TIMEOUT,
    services::{ServiceController, ServiceState, StartMode},
    utils::command::SystemRunner,
};

#[derive(Subcommand)]
pub enum ServicesCommand {
    /// List installed services
    List {
        /// Only running services
        #[arg(long)]
        running: bool,
    },
    /// Show a service's state and configuration
    Query { name: String },
    /// Start a service
    Start { name: String },
    /// Stop a service
    Stop { name: String },
    /// Change a service's start mode
    SetMode {
        name: String,
        /// auto, delayed-auto, demand (manual) or disabled
        mode: StartMode,
    },
}

fn state_label(state: Option<ServiceState>) -> String {
    state.map_or_else(|| "UNKNOWN".to_string(), |s| s.to_string())
}

pub fn execute(command: ServicesCommand, _config: &AppConfig) -> Result<()> {
    let runner = SystemRunner;
    let sc = ServiceController::new(&runner, SERVICE_COMMAND_TIMEOUT);

    match command {
        ServicesCommand::List { running } => {
            let services = sc.list()?;
            let shown: Vec<_> = services
                .iter()
                .filter(|s| !running || s.state == Some(ServiceState::Running))
                .collect();
            for service in &shown {
                println!(
                    "{:<16} {:<32} {}",
                    state_label(service.state),
                    service.name,
                    service.display_name
                );
            }
            println!("{} services", shown.len());
        }
        ServicesCommand::Query { name } => {
            let name = sc.resolve_name(&name)?;
            let info = sc.query(&name)?;
            println!("Name:         {}", info.name);
            println!("Display name: {}", info.display_name);
            println!("State:        {}", state_label(info.state));
            if let Some(mode) = info.start_mode {
                println!("Start mode:   {}", mode);
            }
            if let Some(path) = info.binary_path {
                println!("Binary:       {}", path);
            }
        }
        ServicesCommand::Start { name } => {
            let name = sc.resolve_name(&name)?;
            println!("{}", sc.start(&name)?);
        }
        ServicesCommand::Stop { name } => {
            let name = sc.resolve_name(&name)?;
            println!("{}", sc.stop(&name)?);
        }
        ServicesCommand::SetMode { name, mode } => {
            let name = sc.resolve_name(&name)?;
            println!("{}", sc.set_start_mode(&name, mode)?);
        }
    }
    Ok(())
}
