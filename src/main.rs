use skipnext::{
    cli::{Cli, Command, SettingsAction},
    config::Config,
    heuristics::HeuristicTable,
    injector::{Request, Response, SettingsRelay},
    loader, logging,
    logging::LogLevel,
    next_episode::find_next_episode_links,
    report::PageReport,
    settings::{NextBehavior, Settings},
    storage::open_settings_store,
    ui::session::Session,
};

use clap::Parser;
use eyre::{Result, eyre};
use std::path::PathBuf;

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(LogLevel::from_verbosity(cli.verbose, cli.debug));

    let config = match load_config(cli.config.clone()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Warning: Could not load configuration: {}", err);
            eprintln!("Starting with default settings");
            Config::in_dir(std::env::temp_dir().join("skipnext"))
        }
    };

    match cli.command {
        Command::Inspect { page, json } => inspect(&page, json, &config),
        Command::Next { page } => next(&page, &config),
        Command::Settings { action } => settings(action.unwrap_or(SettingsAction::Show), &config),
        Command::Watch { pages } => {
            let mut session = Session::new(config)?;
            session.open(&pages)?;
            session.run()
        }
    }
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::new(),
    }
}

fn inspect(source: &str, json: bool, config: &Config) -> Result<()> {
    let mut page = loader::load_page(source, config.viewport)?;
    let store = open_settings_store(&config.storage_path);
    let report = PageReport::build(&mut page, store, config);
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{report}");
    }
    Ok(())
}

fn next(source: &str, config: &Config) -> Result<()> {
    let page = loader::load_page(source, config.viewport)?;
    let heuristics = HeuristicTable::with_extra(&config.extra_next_patterns);
    let links = find_next_episode_links(&page, &heuristics);
    if links.is_empty() {
        return Err(eyre!("Next episode not found"));
    }
    for link in links {
        println!("{}\t{}", link.url, link.label);
    }
    Ok(())
}

fn settings(action: SettingsAction, config: &Config) -> Result<()> {
    let store = open_settings_store(&config.storage_path);
    let relay = SettingsRelay::new(store);
    match action {
        SettingsAction::Show => print_settings(&relay.effective_settings())?,
        SettingsAction::Set {
            skip_time,
            next_behavior,
            skip_button,
            next_button,
        } => {
            let mut settings = relay.effective_settings();
            if let Some(val) = skip_time {
                settings.skip_time = val;
            }
            if let Some(val) = next_behavior {
                settings.next_behavior = NextBehavior::parse(&val)
                    .ok_or_else(|| eyre!("next behavior must be auto or manual, got {val:?}"))?;
            }
            if let Some(val) = skip_button {
                settings.skip_button_enabled = val;
            }
            if let Some(val) = next_button {
                settings.next_button_enabled = val;
            }
            save(&relay, &settings)?;
            print_settings(&settings)?;
        }
        SettingsAction::Reset => {
            let settings = Settings::default();
            save(&relay, &settings)?;
            print_settings(&settings)?;
        }
        SettingsAction::Relay { request } => println!("{}", relay.handle_json(&request)?),
    }
    Ok(())
}

fn save(relay: &SettingsRelay, settings: &Settings) -> Result<()> {
    let request = Request::SaveSettings {
        settings: settings.to_value(),
    };
    match relay.handle(request) {
        Response::Saved { success: true } => Ok(()),
        _ => Err(eyre!("settings could not be saved")),
    }
}

fn print_settings(settings: &Settings) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&settings.to_value())?);
    Ok(())
}
