use clap::Parser;

use hello_httpd::config::{self, Config, FileSource};
use hello_httpd::error::StartupError;
use hello_httpd::logger;
use hello_httpd::server::{signal, HostWatch, ServerLoop};

/// Answer every TCP connection with a canned HTTP response
#[derive(Debug, Parser)]
#[command(name = "hello_httpd", version)]
struct Args {
    /// Config file path; the extension may be omitted
    #[arg(short, long, default_value = config::DEFAULT_CONFIG_PATH)]
    config: String,

    /// Validate the configuration, print it and exit
    #[arg(long)]
    check: bool,
}

fn main() {
    let args = Args::parse();

    let code = match run(&args) {
        Ok(code) => code,
        Err(e) => {
            logger::log_error(&e.to_string());
            1
        }
    };

    // No destructors past this point: abandoned slots are closed by the OS
    std::process::exit(code);
}

fn run(args: &Args) -> Result<i32, StartupError> {
    let cfg = Config::load_from(&args.config)?;

    if args.check {
        return match cfg.to_toml() {
            Ok(rendered) => {
                print!("{rendered}");
                Ok(0)
            }
            Err(e) => {
                logger::log_error(&e);
                Ok(1)
            }
        };
    }

    logger::init(&cfg).map_err(StartupError::Logger)?;

    let host = if cfg.host.exit_on_parent_death {
        HostWatch::parent()
    } else {
        HostWatch::Detached
    };

    let server = ServerLoop::new(cfg.clone(), FileSource::new(args.config.as_str()), host)?;
    logger::log_server_start(&server.local_addr(), &cfg);
    signal::start_signal_handler(server.bridge()).map_err(StartupError::Signals)?;

    Ok(server.run().exit_code())
}
