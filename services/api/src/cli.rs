use crate::demo::{run_demo, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use consular_intake::config::DEFAULT_ATTACHMENT_CAP_BYTES;
use consular_intake::error::AppError;
use consular_intake::intake::{FieldRequirement, ServiceKind, ServiceRegistry};

#[derive(Parser, Debug)]
#[command(
    name = "Consular Intake Service",
    about = "Run the consular service-intake-to-payment pipeline from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Run one intake saga end to end against in-process stand-ins
    Demo(DemoArgs),
    /// Print the field rules and attachment cap for the service forms
    Schema(SchemaArgs),
}

#[derive(Args, Debug)]
pub(crate) struct SchemaArgs {
    /// Limit output to one service (all services when omitted)
    #[arg(long, value_parser = crate::infra::parse_service)]
    pub(crate) service: Option<ServiceKind>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Demo(args) => run_demo(args).await,
        Command::Schema(args) => {
            print_schemas(args);
            Ok(())
        }
    }
}

fn print_schemas(args: SchemaArgs) {
    let registry = ServiceRegistry::standard(DEFAULT_ATTACHMENT_CAP_BYTES);
    let services: Vec<ServiceKind> = match args.service {
        Some(service) => vec![service],
        None => ServiceKind::ALL.to_vec(),
    };

    for service in services {
        let schema = registry.schema(service);
        println!("{}:", service.label());
        for rule in &schema.rules {
            match rule.requirement {
                FieldRequirement::Always => println!("  {}", rule.name),
                FieldRequirement::When { field, equals } => {
                    println!("  {} (when {field} = {equals})", rule.name)
                }
            }
        }
        println!(
            "  attachments: pdf/jpeg/png up to {} bytes",
            registry.attachment_cap_bytes(service)
        );
    }
}
