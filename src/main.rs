use schema_model::cli;
use schema_model::format::FormatRegistry;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    FormatRegistry::init();
    let command_line_interface = cli::CommandLineInterface::load();
    command_line_interface.run()
}
