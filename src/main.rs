use std::process::ExitCode;

use pingora_core::server::{configuration::Opt, Server};

use anvil_gateway::{config::Config, logging::Logger, service::http::build_gateway_service};

fn main() -> ExitCode {
    // Read command-line arguments
    let opt = Opt::parse_args();

    // Load configuration with optional override
    let config = match Config::load_yaml_with_opt_override(&opt) {
        Ok(config) => config,
        Err(e) => {
            env_logger::init();
            log::error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging, through the file logger when a path is configured
    let logger = config.log.clone().map(Logger::new);
    match &logger {
        Some(logger) => logger.init_env_logger(),
        None => env_logger::init(),
    }

    log::info!("Building gateway service...");
    let gateway_service = match build_gateway_service(&config) {
        Ok(service) => service,
        Err(e) => {
            log::error!("Failed to initialize gateway service: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Create Pingora server with optional configuration
    let mut server = Server::new_with_opt_and_conf(Some(opt), config.pingora);

    // Bootstrapping and server startup
    log::info!("Bootstrapping...");
    server.bootstrap();

    log::info!("Bootstrapped. Adding Services...");
    if let Some(logger) = logger {
        server.add_service(logger);
    }
    server.add_service(gateway_service);

    log::info!("Starting Server...");
    server.run_forever()
}
