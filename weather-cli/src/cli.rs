use std::{fmt, sync::Arc};

use anyhow::Context;
use clap::{Parser, Subcommand};
use inquire::{InquireError, Password, Select, Text};
use weather_core::{
    Config, FileStore, GeolocationProvider, OpenWeatherProvider, WeatherStore,
};

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Weather dashboard for the terminal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the OpenWeather API key and default location.
    Configure,

    /// Show current conditions.
    Show {
        /// Place name; if absent, uses your location or the default place.
        place: Option<String>,
    },

    /// Show current conditions for your current location.
    Here,

    /// Show the 5-day forecast.
    Forecast {
        /// Place name; if absent, uses your location or the default place.
        place: Option<String>,
    },

    /// Switch between metric and imperial units.
    Units,

    /// List recent searches.
    History {
        /// Forget all recent searches.
        #[arg(long)]
        clear: bool,
    },

    /// Interactive dashboard.
    Interactive,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure()?,
            Command::Show { place } => {
                let app = App::open()?;
                app.load(place.as_deref()).await?;
                render::state(&app.store.snapshot());
            }
            Command::Here => {
                let app = App::open()?;
                app.store.use_current_position(app.geolocation()?).await;
                render::state(&app.store.snapshot());
            }
            Command::Forecast { place } => {
                let app = App::open()?;
                app.load(place.as_deref()).await?;
                let state = app.store.snapshot();
                match &state.forecast {
                    Some(forecast) => render::forecast(forecast),
                    None => render::state(&state),
                }
            }
            Command::Units => {
                let app = App::open()?;
                app.store.toggle_units().await;
                println!("Units set to {}.", app.store.snapshot().units);
            }
            Command::History { clear } => {
                let app = App::open()?;
                if clear {
                    app.store.clear_search_history();
                    println!("Search history cleared.");
                } else {
                    render::history(&app.store.snapshot());
                }
            }
            Command::Interactive => App::open()?.interactive().await?,
        }

        Ok(())
    }
}

fn configure() -> anyhow::Result<()> {
    let mut config = Config::load()?;

    let api_key = Password::new("OpenWeather API key:")
        .without_confirmation()
        .with_help_message("Get one at https://openweathermap.org/api")
        .prompt()?;
    config.set_api_key(api_key);

    let default_location = Text::new("Default location:")
        .with_default(&config.default_location)
        .prompt()?;
    if !default_location.trim().is_empty() {
        config.default_location = default_location.trim().to_string();
    }

    config.save()?;
    println!("Configuration saved to {}", Config::config_file_path()?.display());
    Ok(())
}

/// Store wired to the configured service and persisted state.
struct App {
    config: Config,
    store: WeatherStore,
}

impl App {
    fn open() -> anyhow::Result<Self> {
        let config = Config::load()?;
        let provider = OpenWeatherProvider::from_config(&config)?;
        let state_path = Config::state_file_path()?;
        tracing::debug!(path = %state_path.display(), "Opening state file");
        let storage = FileStore::open(state_path);

        let store = WeatherStore::new(Arc::new(provider), Arc::new(storage))
            .with_default_location(config.default_location.clone());

        Ok(Self { config, store })
    }

    fn geolocation(&self) -> anyhow::Result<GeolocationProvider> {
        GeolocationProvider::from_config(&self.config.geolocation)
            .context("Failed to set up geolocation")
    }

    /// Named load, or the startup path when no place is given.
    async fn load(&self, place: Option<&str>) -> anyhow::Result<()> {
        match place {
            Some(place) => self.store.load_by_name(place).await,
            None => self.store.initialize(self.geolocation()?).await,
        }
        Ok(())
    }

    async fn interactive(self) -> anyhow::Result<()> {
        self.load(None).await?;
        render::state(&self.store.snapshot());

        loop {
            let action = match Select::new("What next?", Action::ALL.to_vec()).prompt() {
                Ok(action) => action,
                Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => {
                    break;
                }
                Err(e) => return Err(e.into()),
            };

            match action {
                Action::Search => {
                    let place = Text::new("Place:").prompt()?;
                    self.store.load_by_name(&place).await;
                    render::state(&self.store.snapshot());
                }
                Action::Recent => {
                    let entries = self.store.snapshot().history.entries().to_vec();
                    if entries.is_empty() {
                        println!("No recent searches.");
                        continue;
                    }
                    let place = Select::new("Recent searches:", entries).prompt()?;
                    self.store.load_by_name(&place).await;
                    render::state(&self.store.snapshot());
                }
                Action::Here => {
                    self.store.use_current_position(self.geolocation()?).await;
                    render::state(&self.store.snapshot());
                }
                Action::Forecast => match &self.store.snapshot().forecast {
                    Some(forecast) => render::forecast(forecast),
                    None => println!("No forecast loaded."),
                },
                Action::ToggleUnits => {
                    self.store.toggle_units().await;
                    println!("Units set to {}.", self.store.snapshot().units);
                    render::state(&self.store.snapshot());
                }
                Action::ClearHistory => {
                    self.store.clear_search_history();
                    println!("Search history cleared.");
                }
                Action::Quit => break,
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Search,
    Recent,
    Here,
    Forecast,
    ToggleUnits,
    ClearHistory,
    Quit,
}

impl Action {
    const ALL: [Action; 7] = [
        Action::Search,
        Action::Recent,
        Action::Here,
        Action::Forecast,
        Action::ToggleUnits,
        Action::ClearHistory,
        Action::Quit,
    ];
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Action::Search => "Search for a place",
            Action::Recent => "Recent searches",
            Action::Here => "Use my location",
            Action::Forecast => "Show forecast",
            Action::ToggleUnits => "Toggle metric/imperial",
            Action::ClearHistory => "Clear search history",
            Action::Quit => "Quit",
        };
        f.write_str(label)
    }
}
