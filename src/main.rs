//! Mazout CLI - telemetry and control link client.

use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::signal;
use tokio::task::JoinHandle;

use mazout::cli::*;
use mazout::config::{init_logging, Config};
use mazout::error::{Error, Result};
use mazout::protocol::{decode_packet, encode_value, DataKind, Value};
use mazout::replay::{
    generate_file, read_records, GeneratorConfig, ReplayConfig, ReplayOutcome, ReplaySession,
    TelemetryRecord,
};
use mazout::session::{
    parse_type_code, CancellationToken, ReceiveOutcome, ReceiveReport, Session, StopReason,
};
use mazout::VERSION;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{} {}", "✗".red(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load_or_default(cli.config.as_deref())?;

    // Command line wins over the file
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format.as_str().into();
    }
    if cli.no_color {
        config.logging.color = false;
        colored::control::set_override(false);
    }
    init_logging(&config.logging)?;

    match cli.command {
        Commands::Connect(link) => run_connect(link, config).await,
        Commands::Listen(link) => run_listen(link, config).await,
        Commands::Send(args) => run_send(args, config).await,
        Commands::Replay(args) => run_replay(args, config).await,
        Commands::Generate(args) => run_generate(args),
        Commands::Frame(cmd) => run_frame(cmd),
        Commands::Config(args) => run_config(args),
        Commands::Completions(args) => run_completions(args),
    }
}

fn apply_link(config: &mut Config, link: &LinkArgs) {
    if let Some(ref host) = link.host {
        config.link.host = host.clone();
    }
    if let Some(port) = link.port {
        config.link.port = port;
    }
}

fn bar_style(template: &str) -> Result<ProgressStyle> {
    Ok(ProgressStyle::default_bar()
        .template(template)
        .map_err(|e| Error::Internal(format!("progress template: {e}")))?
        .progress_chars("█▓░"))
}

fn spinner_style() -> Result<ProgressStyle> {
    ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .map_err(|e| Error::Internal(format!("progress template: {e}")))
}

/// Connect with a spinner.
async fn connect(config: &Config) -> Result<Session> {
    let target = format!("{}:{}", config.link.host, config.link.port);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(spinner_style()?);
    spinner.set_message(format!("Connecting to {target}..."));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = Session::connect(
        &config.link.host,
        config.link.port,
        config.transport.clone(),
        config.session.clone(),
    )
    .await;

    match result {
        Ok(session) => {
            spinner.finish_with_message(format!("{} Connected to {}", "✓".green(), target));
            Ok(session)
        }
        Err(e) => {
            spinner.finish_with_message(format!("{} Connection failed: {}", "✗".red(), e));
            Err(e)
        }
    }
}

/// Set `token` on Ctrl+C. Only for non-interactive commands: once installed,
/// Ctrl+C no longer terminates the process.
fn stop_on_ctrl_c(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = signal::ctrl_c() => {
                token.request_stop(StopReason::Operator);
            }
            _ = token.stopped() => {}
        }
    })
}

fn print_receive_report(report: &ReceiveReport) {
    let status = match report.outcome {
        ReceiveOutcome::Stopped => "stopped".yellow(),
        ReceiveOutcome::Disconnected => "peer disconnected".red(),
    };
    println!(
        "{} Receive {}: {} packets, {} dropped",
        "●".cyan(),
        status,
        report.stats.packets,
        report.stats.dropped
    );
}

fn print_replay_outcome(outcome: &ReplayOutcome) {
    if outcome.is_complete() {
        println!("{} Sent all {} records", "✓".green(), outcome.total);
    } else {
        println!(
            "{} Replay stopped after {}/{} records",
            "●".yellow(),
            outcome.sent,
            outcome.total
        );
    }
}

/// Run the interactive menu
async fn run_connect(link: LinkArgs, mut config: Config) -> Result<()> {
    apply_link(&mut config, &link);

    println!(
        "{}",
        "╔══════════════════════════════════════════╗".bright_cyan()
    );
    println!(
        "{}",
        "║     MAZOUT                               ║".bright_cyan()
    );
    println!(
        "{}",
        format!("║     Version {:<29}║", VERSION).bright_cyan()
    );
    println!(
        "{}",
        "╚══════════════════════════════════════════╝".bright_cyan()
    );

    let mut console = Console::new();

    loop {
        println!();
        println!("{}", "Main menu".bright_white().bold());
        println!("  1. Connect to {}:{}", config.link.host, config.link.port);
        println!("  2. Quit");

        let Some(choice) = console.prompt("Select an option: ").await? else {
            return Ok(());
        };

        match choice.as_str() {
            "1" => match connect(&config).await {
                Ok(session) => session_menu(session, &mut console, &config).await?,
                Err(_) => continue,
            },
            "2" | "q" => {
                println!("Goodbye");
                return Ok(());
            }
            _ => println!("{} Invalid option", "✗".red()),
        }
    }
}

async fn session_menu(mut session: Session, console: &mut Console, config: &Config) -> Result<()> {
    loop {
        if !session.is_connected() {
            println!("{} Connection lost", "✗".red());
            break;
        }

        println!();
        println!("{}", "Session".bright_white().bold());
        println!("  1. Send data");
        println!("  2. Receive data");
        println!("  3. Send data from file");
        println!("  4. Disconnect");

        let Some(choice) = console.prompt("Select an option: ").await? else {
            break;
        };

        let result = match choice.as_str() {
            "1" => send_interactive(&session, console).await,
            "2" => receive_interactive(&mut session, console).await,
            "3" => replay_interactive(&session, console, &config.replay).await,
            "4" => break,
            _ => {
                println!("{} Invalid option", "✗".red());
                continue;
            }
        };

        if let Err(e) = result {
            println!("{} {}", "✗".red(), e);
        }
    }

    session.close().await?;
    println!("{} Disconnected", "●".yellow());
    Ok(())
}

async fn send_interactive(session: &Session, console: &mut Console) -> Result<()> {
    console.print_kinds();

    let (_token, sender) = session.sender();
    let outcome = session.run_sender(sender, console).await?;

    println!(
        "{} Sent {} value(s), {} rejected",
        "●".cyan(),
        outcome.sent,
        outcome.rejected
    );
    Ok(())
}

async fn receive_interactive(session: &mut Session, console: &mut Console) -> Result<()> {
    println!("{} Receiving... type 'q' to stop", "→".cyan());

    let (token, mut events) = session.start_receiving().await?;
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            print_event(&event);
        }
    });

    console.wait_for_stop(&token).await?;
    let report = session.stop_receiving().await?;
    let _ = printer.await;

    if let Some(report) = report {
        print_receive_report(&report);
    }
    Ok(())
}

async fn replay_interactive(
    session: &Session,
    console: &mut Console,
    config: &ReplayConfig,
) -> Result<()> {
    let records = read_records(&config.csv_path)?;
    println!(
        "{} Sending {} records from {}... type 'q' to stop",
        "→".cyan(),
        records.len(),
        config.csv_path.display()
    );

    let outcome = replay(session, &records, config, console, CancellationToken::new()).await?;
    print_replay_outcome(&outcome);
    Ok(())
}

/// Stream `records` with a progress bar until done, stopped, or failed.
async fn replay(
    session: &Session,
    records: &[TelemetryRecord],
    config: &ReplayConfig,
    console: &mut Console,
    token: CancellationToken,
) -> Result<ReplayOutcome> {
    let pb = ProgressBar::new(records.len() as u64);
    pb.set_style(bar_style(
        "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} records  {msg}",
    )?);

    let player = ReplaySession::new(session.transport(), token.clone()).with_config(config);
    let run = player.run(records, |sent, record| {
        pb.set_position(sent as u64);
        pb.set_message(record.time.clone());
    });
    tokio::pin!(run);

    let result = tokio::select! {
        result = &mut run => result,
        stop = console.wait_for_stop(&token) => {
            stop?;
            run.await
        }
    };

    match result {
        Ok(outcome) => {
            pb.finish_and_clear();
            Ok(outcome)
        }
        Err(e) => {
            pb.abandon();
            session.note_failure(&e);
            Err(e)
        }
    }
}

/// Print every frame until stopped or disconnected
async fn run_listen(link: LinkArgs, mut config: Config) -> Result<()> {
    apply_link(&mut config, &link);

    let mut session = connect(&config).await?;
    let (token, mut events) = session.start_receiving().await?;
    let ctrl_c = stop_on_ctrl_c(token.clone());

    println!("{} Listening... type 'q' or press Ctrl+C to stop", "→".cyan());

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            print_event(&event);
        }
    });

    let mut console = Console::new();
    console.wait_for_stop(&token).await?;

    let report = session.stop_receiving().await;
    let _ = printer.await;
    ctrl_c.abort();
    session.close().await?;

    if let Some(report) = report? {
        print_receive_report(&report);
    }
    Ok(())
}

/// Send one value and exit
async fn run_send(args: SendArgs, mut config: Config) -> Result<()> {
    apply_link(&mut config, &args.link);

    let kind = parse_type_code(&args.type_code)?;
    let value = Value::parse(kind, &args.value)?;

    let session = connect(&config).await?;
    let result = session.send_once(kind, &value).await;
    session.close().await?;
    result?;

    println!("{} Sent {} = {}", "✓".green(), kind, value);
    Ok(())
}

/// Stream a CSV file as JSON telemetry
async fn run_replay(args: ReplayArgs, mut config: Config) -> Result<()> {
    apply_link(&mut config, &args.link);
    config.replay.apply_overrides(args.file, args.interval_ms, args.lines);

    let records = read_records(&config.replay.csv_path)?;
    println!(
        "{} Loaded {} records from {}",
        "✓".green(),
        records.len(),
        config.replay.csv_path.display()
    );

    let session = connect(&config).await?;
    let token = CancellationToken::new();
    let ctrl_c = stop_on_ctrl_c(token.clone());

    let mut console = Console::new();
    let result = replay(&session, &records, &config.replay, &mut console, token).await;

    ctrl_c.abort();
    session.close().await?;

    print_replay_outcome(&result?);
    Ok(())
}

/// Generate a synthetic sensor file
fn run_generate(args: GenerateArgs) -> Result<()> {
    let config = GeneratorConfig {
        duration_secs: args.duration,
        sample_rate_hz: args.rate,
        noise: args.noise,
        seed: args.seed,
    };

    let rows = generate_file(&args.output, config)?;
    println!(
        "{} Generated {} data points in {}",
        "✓".green(),
        rows,
        args.output.display()
    );
    Ok(())
}

fn format_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Offline frame tools
fn run_frame(cmd: FrameCommand) -> Result<()> {
    match cmd {
        FrameCommand::Encode { type_code, value } => {
            let kind = DataKind::from_code(type_code);
            let value = Value::parse(kind, &value)?;
            let frame = encode_value(kind, &value)?;

            println!("{}", format_hex(&frame).bright_green());
            println!("  {} {} ({})", "kind:".dimmed(), kind, kind.encoding());
            println!("  {} {}", "value:".dimmed(), value);
        }
        FrameCommand::Decode { hex } => {
            let digits: String = hex
                .concat()
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            let bytes = hex::decode(&digits)
                .map_err(|e| anyhow::anyhow!("invalid hex '{digits}': {e}"))?;
            let packet = decode_packet(&bytes)?;

            println!("{}", packet.to_string().bright_green());
            println!("  {} {}", "type code:".dimmed(), packet.type_code());
            println!("  {} {}", "kind:".dimmed(), packet.kind());
            println!("  {} {}", "length:".dimmed(), packet.payload().len());
            println!("  {} {}", "payload:".dimmed(), format_hex(packet.payload()));
            println!("  {} {}", "reading:".dimmed(), packet.reading());
            println!("  {} {}", "value:".dimmed(), packet.value());
            println!("  {} {:#04X}", "checksum:".dimmed(), packet.checksum());
        }
    }
    Ok(())
}

/// Show example configuration
fn run_config(args: ConfigArgs) -> Result<()> {
    let output = Config::example().to_toml()?;

    if let Some(ref path) = args.output {
        std::fs::write(path, &output)?;
        println!(
            "{} Configuration written to {}",
            "✓".green(),
            path.display()
        );
    } else {
        println!("{output}");
    }

    Ok(())
}

/// Generate shell completions
fn run_completions(args: CompletionsArgs) -> Result<()> {
    use clap::CommandFactory;
    use clap_complete::generate;

    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    let shell: clap_complete::Shell = args.shell.into();

    generate(shell, &mut cmd, name, &mut std::io::stdout());

    Ok(())
}
