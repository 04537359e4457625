use clap::{App, Arg};
use colored::*;
use simterm::transport::{ConsoleTransport, UdpTransport};
use simterm::{BusType, LinkConnector, SimTerminal, TerminalConfig};
use tracing::{error, info, Level};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = App::new("simterm")
        .version("0.1.0")
        .author("Space Systems Engineering Team")
        .about("Simulator Terminal - drive simulated I2C, CAN, SPI, UART and command buses")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("JSON configuration file")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("connection")
                .long("connection")
                .value_name("URI")
                .help("Backend connection string (tcp://host:port or loopback://name)")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("bus")
                .short("b")
                .long("bus")
                .value_name("BUS")
                .help("Simulator bus to start on")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("bus-type")
                .short("t")
                .long("bus-type")
                .value_name("TYPE")
                .help("Bus type of the start bus")
                .takes_value(true)
                .validator(|v| v.parse::<BusType>().map(|_| ()).map_err(|e| e.to_string())),
        )
        .arg(
            Arg::with_name("node")
                .short("n")
                .long("node")
                .value_name("NODE")
                .help("Name (or address) of this terminal's node")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("target")
                .long("target")
                .value_name("NODE")
                .help("Simulator node to command")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("udp")
                .short("u")
                .long("udp")
                .value_name("PORT")
                .help("Serve commands over UDP on PORT instead of the console")
                .takes_value(true)
                .validator(|v| match v.parse::<u16>() {
                    Ok(_) => Ok(()),
                    Err(_) => Err("Port must be a number between 0 and 65535".into()),
                }),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Enable debug logging"),
        )
        .get_matches();

    let level = if matches.is_present("verbose") {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let mut config = match matches.value_of("config") {
        Some(path) => TerminalConfig::load(path)?,
        None => TerminalConfig::default(),
    };
    if let Some(uri) = matches.value_of("connection") {
        config.nos_connection_string = uri.to_string();
    }
    if let Some(bus) = matches.value_of("bus") {
        config.start_bus = bus.to_string();
    }
    if let Some(bus_type) = matches.value_of("bus-type") {
        config.bus_type = Some(bus_type.parse()?);
    }
    if let Some(node) = matches.value_of("node") {
        config.term_node_name = node.to_string();
    }
    if let Some(target) = matches.value_of("target") {
        config.sim_commanded = target.to_string();
    }
    if let Some(port) = matches.value_of("udp") {
        config.udp_port = Some(port.parse()?);
    }

    info!("terminal simulator starting");
    let mut terminal = SimTerminal::new(&config, Box::new(LinkConnector));
    let startup_output = terminal.start(&config.startup_commands);

    let outcome = match config.udp_port {
        Some(port) => {
            for text in &startup_output {
                info!("{}", text);
            }
            let transport = UdpTransport::bind_port(port).await?;
            println!(
                "{} {}",
                "Listening for commands on UDP".bright_blue().bold(),
                transport.local_addr()
            );
            transport.run(&mut terminal).await
        }
        None => {
            let mut console = ConsoleTransport::stdio();
            for text in &startup_output {
                console.print(&text.yellow().to_string()).await?;
            }
            console.run(&mut terminal).await
        }
    };

    if let Err(e) = &outcome {
        error!("Transport error: {}", e);
    }
    info!("terminal simulator terminating");
    outcome.map_err(Into::into)
}
