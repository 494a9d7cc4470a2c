mod backlog;
mod data;
mod grocery;
mod helpers;
mod recipe;
mod weather;
mod week;

use larder_core::db::SqliteStore;
use larder_core::service::Dashboard;

/// The dashboard as the CLI and server mount it.
pub(crate) type Larder = Dashboard<SqliteStore>;

pub(crate) use backlog::{cmd_backlog_add, cmd_backlog_list, cmd_backlog_remove, cmd_backlog_suggest};
pub(crate) use data::{cmd_export, cmd_import};
pub(crate) use grocery::{
    cmd_grocery_add, cmd_grocery_check, cmd_grocery_clear_checked, cmd_grocery_edit,
    cmd_grocery_export, cmd_grocery_list, cmd_grocery_remove, cmd_grocery_stores,
    cmd_grocery_suggest,
};
pub(crate) use recipe::{
    RecipeInput, cmd_recipe_delete, cmd_recipe_import, cmd_recipe_list, cmd_recipe_save,
    cmd_recipe_show, cmd_recipe_to_grocery,
};
pub(crate) use weather::{cmd_weather, load_cache, save_cache};
pub(crate) use week::{cmd_week_clear, cmd_week_place, cmd_week_set, cmd_week_show};
