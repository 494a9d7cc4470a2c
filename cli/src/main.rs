mod commands;
mod config;
mod openmeteo;
mod server;

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::commands::{
    Larder, RecipeInput, cmd_backlog_add, cmd_backlog_list, cmd_backlog_remove,
    cmd_backlog_suggest, cmd_export, cmd_grocery_add, cmd_grocery_check,
    cmd_grocery_clear_checked, cmd_grocery_edit, cmd_grocery_export, cmd_grocery_list,
    cmd_grocery_remove, cmd_grocery_stores, cmd_grocery_suggest, cmd_import, cmd_recipe_delete,
    cmd_recipe_import, cmd_recipe_list, cmd_recipe_save, cmd_recipe_show, cmd_recipe_to_grocery,
    cmd_weather, cmd_week_clear, cmd_week_place, cmd_week_set, cmd_week_show, load_cache,
};
use crate::config::Config;
use crate::openmeteo::OpenMeteoClient;
use larder_core::db::SqliteStore;
use larder_core::models::{GroceryEdit, NewGroceryItem};
use larder_core::planner::MealKind;

#[derive(Parser)]
#[command(
    name = "larder",
    version,
    about = "Household dashboard: weekly meal plan, recipes, grocery list and weather"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or edit this week's dinner plan
    Week {
        #[command(subcommand)]
        command: WeekCommands,
    },
    /// Dinner ideas waiting to be planned
    Idea {
        #[command(subcommand)]
        command: BacklogCommands,
    },
    /// Lunch prep backlog
    Lunch {
        #[command(subcommand)]
        command: BacklogCommands,
    },
    /// Manage dinner and lunch recipes
    Recipe {
        #[command(subcommand)]
        command: RecipeCommands,
    },
    /// Manage the grocery list
    Grocery {
        #[command(subcommand)]
        command: GroceryCommands,
    },
    /// Show the 7-day forecast (cached for 15 minutes)
    Weather {
        /// Ignore the cache and fetch again
        #[arg(long)]
        refresh: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export every stored document as JSON
    Export {
        /// Write to this file instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Import documents from a JSON export, replacing what is stored under the same paths
    Import {
        /// Path to the JSON export
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
        /// Disable API key authentication (for development/testing)
        #[arg(long)]
        no_auth: bool,
    },
}

#[derive(Subcommand)]
enum WeekCommands {
    /// Show the plan, Sunday through Saturday
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Plan a meal for a day
    Set {
        /// Day: sunday-saturday, sun-sat, or 0-6
        day: String,
        /// Meal name
        meal: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Clear one day, or the whole week when no day is given
    Clear {
        /// Day: sunday-saturday, sun-sat, or 0-6
        day: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Move a dinner idea onto a day
    Place {
        /// Position in the idea list (as shown by `idea list`)
        position: usize,
        /// Day: sunday-saturday, sun-sat, or 0-6
        day: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum BacklogCommands {
    /// Add an entry
    Add {
        /// Meal name
        text: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List entries with their positions
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove an entry by position
    Remove {
        /// Position (as shown by `list`)
        position: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Suggest remembered meals matching a query
    Suggest {
        /// Text to match
        query: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Move an entry onto a day of the week plan
    Place {
        /// Position (as shown by `list`)
        position: usize,
        /// Day: sunday-saturday, sun-sat, or 0-6
        day: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum RecipeCommands {
    /// Create or update a recipe
    Save {
        /// Recipe name
        name: String,
        /// Use the lunch recipe book
        #[arg(long)]
        lunch: bool,
        /// Main protein
        #[arg(long)]
        protein: Option<String>,
        /// Instructions text
        #[arg(long)]
        instructions: Option<String>,
        /// Prep time in minutes
        #[arg(long)]
        prep: Option<u32>,
        /// Cook time in minutes
        #[arg(long)]
        cook: Option<u32>,
        /// Number of servings
        #[arg(long)]
        servings: Option<u32>,
        /// Ingredient as "qty|unit|item" (repeatable; replaces the ingredient list)
        #[arg(short, long = "ingredient", value_name = "QTY|UNIT|ITEM")]
        ingredients: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a recipe
    Show {
        /// Recipe name
        name: String,
        /// Use the lunch recipe book
        #[arg(long)]
        lunch: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List recipes
    List {
        /// Use the lunch recipe book
        #[arg(long)]
        lunch: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a recipe
    Delete {
        /// Recipe name
        name: String,
        /// Use the lunch recipe book
        #[arg(long)]
        lunch: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Import a recipe from a Cooklang (.cook) file
    Import {
        /// Path to the .cook file
        file: PathBuf,
        /// Use the lunch recipe book
        #[arg(long)]
        lunch: bool,
        /// Recipe name override (defaults to metadata title or filename)
        #[arg(long)]
        name: Option<String>,
        /// Main protein
        #[arg(long)]
        protein: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Copy a recipe's ingredients onto the grocery list
    ToGrocery {
        /// Recipe name
        name: String,
        /// Use the lunch recipe book
        #[arg(long)]
        lunch: bool,
        /// Only this ingredient (position as shown by `recipe show`)
        #[arg(long)]
        row: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum GroceryCommands {
    /// Add an item (omitted fields reuse what was last entered for the name)
    Add {
        /// Item name
        name: String,
        /// Quantity (a number)
        #[arg(short, long)]
        qty: Option<String>,
        /// Unit (lbs, pkg, cups, gallons, oz, ...)
        #[arg(short, long)]
        unit: Option<String>,
        /// Store
        #[arg(short, long)]
        store: Option<String>,
        /// Product link (http/https)
        #[arg(long)]
        url: Option<String>,
        /// Notes
        #[arg(long)]
        notes: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the list grouped by store
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Toggle an item's checked state
    Check {
        /// Item ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove an item
    Remove {
        /// Item ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit an item's fields
    Edit {
        /// Item ID
        id: String,
        /// New name
        #[arg(long)]
        name: Option<String>,
        /// New quantity
        #[arg(short, long)]
        qty: Option<String>,
        /// New unit
        #[arg(short, long)]
        unit: Option<String>,
        /// New store
        #[arg(short, long)]
        store: Option<String>,
        /// New product link
        #[arg(long)]
        url: Option<String>,
        /// New notes
        #[arg(long)]
        notes: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove every checked item
    ClearChecked {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Suggest remembered items (or units with --units)
    Suggest {
        /// Text to match (empty lists everything)
        #[arg(default_value = "")]
        query: String,
        /// Suggest units instead of items
        #[arg(long)]
        units: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List known stores
    Stores {
        /// Text to match
        #[arg(default_value = "")]
        query: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export the list as CSV
    Export {
        /// Write to this file instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

fn kind(lunch: bool) -> MealKind {
    if lunch { MealKind::Lunch } else { MealKind::Dinner }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

#[allow(clippy::too_many_lines)]
async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;

    // Weather never touches the database.
    if let Commands::Weather { refresh, json } = cli.command {
        return cmd_weather(&config, refresh, json).await;
    }

    let store = Arc::new(SqliteStore::open(&config.db_path)?);
    let mut larder = Larder::mount(store);

    match cli.command {
        Commands::Weather { .. } => unreachable!("weather returns before the database opens"),
        Commands::Week { command } => match command {
            WeekCommands::Show { json } => cmd_week_show(&larder, json),
            WeekCommands::Set { day, meal, json } => cmd_week_set(&mut larder, &day, &meal, json),
            WeekCommands::Clear { day, json } => cmd_week_clear(&mut larder, day.as_deref(), json),
            WeekCommands::Place {
                position,
                day,
                json,
            } => cmd_week_place(&mut larder, MealKind::Dinner, position, &day, json),
        },
        Commands::Idea { command } => run_backlog(&mut larder, MealKind::Dinner, command),
        Commands::Lunch { command } => run_backlog(&mut larder, MealKind::Lunch, command),
        Commands::Recipe { command } => match command {
            RecipeCommands::Save {
                name,
                lunch,
                protein,
                instructions,
                prep,
                cook,
                servings,
                ingredients,
                json,
            } => cmd_recipe_save(
                &mut larder,
                kind(lunch),
                &name,
                RecipeInput {
                    protein,
                    instructions,
                    prep_minutes: prep,
                    cook_minutes: cook,
                    servings,
                    ingredients,
                },
                json,
            ),
            RecipeCommands::Show { name, lunch, json } => {
                cmd_recipe_show(&larder, kind(lunch), &name, json)
            }
            RecipeCommands::List { lunch, json } => cmd_recipe_list(&larder, kind(lunch), json),
            RecipeCommands::Delete { name, lunch, json } => {
                cmd_recipe_delete(&mut larder, kind(lunch), &name, json)
            }
            RecipeCommands::Import {
                file,
                lunch,
                name,
                protein,
                json,
            } => cmd_recipe_import(&mut larder, kind(lunch), &file, name, protein, json),
            RecipeCommands::ToGrocery {
                name,
                lunch,
                row,
                json,
            } => cmd_recipe_to_grocery(&mut larder, kind(lunch), &name, row, json),
        },
        Commands::Grocery { command } => match command {
            GroceryCommands::Add {
                name,
                qty,
                unit,
                store,
                url,
                notes,
                json,
            } => cmd_grocery_add(
                &mut larder,
                NewGroceryItem {
                    name,
                    qty: qty.unwrap_or_default(),
                    unit: unit.unwrap_or_default(),
                    store: store.unwrap_or_default(),
                    product_url: url.unwrap_or_default(),
                    notes: notes.unwrap_or_default(),
                },
                json,
            ),
            GroceryCommands::List { json } => cmd_grocery_list(&mut larder, json),
            GroceryCommands::Check { id, json } => cmd_grocery_check(&mut larder, &id, json),
            GroceryCommands::Remove { id, json } => cmd_grocery_remove(&mut larder, &id, json),
            GroceryCommands::Edit {
                id,
                name,
                qty,
                unit,
                store,
                url,
                notes,
                json,
            } => cmd_grocery_edit(
                &mut larder,
                &id,
                &GroceryEdit {
                    name,
                    qty,
                    unit,
                    store,
                    product_url: url,
                    notes,
                },
                json,
            ),
            GroceryCommands::ClearChecked { json } => cmd_grocery_clear_checked(&mut larder, json),
            GroceryCommands::Suggest { query, units, json } => {
                cmd_grocery_suggest(&mut larder, &query, units, json)
            }
            GroceryCommands::Stores { query, json } => cmd_grocery_stores(&query, json),
            GroceryCommands::Export { output } => {
                cmd_grocery_export(&mut larder, output.as_deref())
            }
        },
        Commands::Export { output } => cmd_export(&larder, output.as_deref()),
        Commands::Import { file, json } => cmd_import(&mut larder, &file, json),
        Commands::Serve {
            port,
            bind,
            no_auth,
        } => {
            let api_key = if no_auth {
                None
            } else {
                let (key, _new) = config.load_or_create_api_key()?;
                Some(key)
            };
            let cache_path = config.weather_cache_path();
            let mut cache = load_cache(&cache_path);
            if let Some(coords) = config.weather.coordinates() {
                cache.set_coordinates(coords);
            }
            let weather = server::WeatherService {
                cache: tokio::sync::Mutex::new(cache),
                source: OpenMeteoClient::new(config.weather.coordinates())?,
                cache_path: Some(cache_path),
            };
            server::start_server(larder, weather, port, &bind, api_key).await
        }
    }
}

fn run_backlog(larder: &mut Larder, kind: MealKind, command: BacklogCommands) -> Result<()> {
    match command {
        BacklogCommands::Add { text, json } => cmd_backlog_add(larder, kind, &text, json),
        BacklogCommands::List { json } => cmd_backlog_list(larder, kind, json),
        BacklogCommands::Remove { position, json } => {
            cmd_backlog_remove(larder, kind, position, json)
        }
        BacklogCommands::Suggest { query, json } => cmd_backlog_suggest(larder, kind, &query, json),
        BacklogCommands::Place {
            position,
            day,
            json,
        } => cmd_week_place(larder, kind, position, &day, json),
    }
}
