use pawnstar::config::{interval_from_secs, AssistantConfig};
use pawnstar::console::{self, Command};
use pawnstar::engine::EngineAdapter;
use pawnstar::events;
use pawnstar::scraper::{MoveSource, WebDriverScraper};
use pawnstar::session::Session;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

type LiveSession = Session<WebDriverScraper, EngineAdapter>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AssistantConfig::load()?;

    tracing::info!(url = %config.driver.webdriver_url, "Connecting to WebDriver...");
    let mut scraper = WebDriverScraper::connect(&config.driver).await?;
    if let Err(e) = scraper.open(&config.driver.start_url).await {
        scraper.close().await;
        return Err(e.into());
    }

    let (events_tx, mut events_rx) = events::channel();
    let engine = EngineAdapter::new(config.engine.clone());
    let auto_update = config.auto_update;
    let mut session = Session::new(scraper, engine, config, events_tx);

    println!("PawnStar ready. Type 'help' for commands.");
    if session.user_color().is_none() {
        println!("Set your color with 'white' or 'black'.");
    }
    if auto_update {
        session.start_polling();
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match line.parse::<Command>() {
                    Ok(Command::Quit) => break,
                    Ok(command) => run_command(&mut session, command).await,
                    Err(msg) => println!("{msg}"),
                },
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("Failed to read stdin: {}", e);
                    break;
                }
            },
            Some(event) = events_rx.recv() => {
                println!("{}", console::render_event(&event, session.user_color()));
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        }
    }

    session.close().await;
    Ok(())
}

async fn run_command(session: &mut LiveSession, command: Command) {
    match command {
        Command::SetColor(color) => {
            session.set_user_color(color);
            println!("You play {}", color.title());
        }
        Command::Update => match session.update_board().await {
            Ok(position) => println!("{}", console::render_update(&position, session.user_color())),
            Err(e) => println!("Error: {e}"),
        },
        Command::Suggest => {
            println!("Analyzing...");
            match (session.suggest().await, session.user_color()) {
                (Ok(suggestion), Some(color)) => {
                    println!("{}", console::render_suggestion(color, &suggestion))
                }
                (Ok(suggestion), None) => println!("Best move: {}", suggestion.move_san),
                (Err(e), _) => println!("Error: {e}"),
            }
        }
        Command::Start => {
            if session.start_polling() {
                println!("Auto-update started");
            } else {
                println!("Auto-update is already running");
            }
        }
        Command::Stop => {
            session.stop_polling().await;
            println!("Auto-update stopped");
        }
        Command::AutoSuggest(enabled) => {
            session.set_auto_suggest(enabled);
            println!("Auto-suggest {}", if enabled { "on" } else { "off" });
        }
        Command::Interval(secs) => {
            session.set_poll_interval(interval_from_secs(secs));
            println!(
                "Update interval: {}",
                console::format_time(session.config().poll_interval)
            );
        }
        Command::AnalysisTime(secs) => {
            let budget = session.set_analysis_time(secs);
            println!("Analysis time: {}", console::format_time(budget));
        }
        Command::Board => match session.current().await {
            Some(position) => println!("{}", console::render_update(&position, session.user_color())),
            None => println!("No board yet. Use 'update'."),
        },
        Command::Fen => match session.current().await {
            Some(position) => println!("{}", position.fen()),
            None => println!("No board yet. Use 'update'."),
        },
        Command::Moves => match session.current().await {
            Some(position) if !position.applied().is_empty() => {
                println!("{}", position.applied().to_numbered())
            }
            _ => println!("No moves yet."),
        },
        Command::Engine => match session.check_engine().await {
            Ok(()) => println!("Engine OK"),
            Err(e) => println!("Engine error: {e}"),
        },
        Command::Help => println!("{}", console::HELP),
        Command::Quit => {}
    }
}
