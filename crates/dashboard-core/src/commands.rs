use anyhow::{Context, anyhow};
use chrono::Utc;
use tracing::{debug, info, instrument};

use crate::cli::Invocation;
use crate::config::Config;
use crate::model::{CategoryId, WidgetId};
use crate::render::Renderer;
use crate::storage::Storage;
use crate::store::WidgetStore;
use crate::view::Dashboard;

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "show",
        "search",
        "categories",
        "widgets",
        "add",
        "remove",
        "new",
        "toggle",
        "status",
        "export",
        "reset",
        "_show",
        "help",
        "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(store, view, cfg, renderer, inv))]
pub fn dispatch<S: Storage>(
    store: &mut WidgetStore<S>,
    view: &mut Dashboard,
    cfg: &Config,
    renderer: &mut Renderer,
    inv: Invocation,
) -> anyhow::Result<()> {
    let args = inv.args.as_slice();
    debug!(command = %inv.command, ?args, "dispatching command");

    match inv.command.as_str() {
        "show" => cmd_show(store, view, renderer, args),
        "search" => cmd_search(store, renderer, args),
        "categories" => cmd_categories(store, renderer),
        "widgets" => cmd_widgets(store, view, renderer, args),
        "add" => cmd_add(store, view, args),
        "remove" => cmd_remove(store, view, args),
        "new" => cmd_new(store, view, args),
        "toggle" => cmd_toggle(store, args),
        "status" => cmd_status(store, args),
        "export" => cmd_export(store),
        "reset" => cmd_reset(store),
        "_show" => cmd_show_config(cfg),
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

#[instrument(skip(store, view, renderer, args))]
fn cmd_show<S: Storage>(
    store: &mut WidgetStore<S>,
    view: &mut Dashboard,
    renderer: &mut Renderer,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command show");
    let query = args.join(" ");
    view.set_query(store, &query);
    renderer.print_cards(&view.cards(store))
}

#[instrument(skip(store, renderer, args))]
fn cmd_search<S: Storage>(
    store: &mut WidgetStore<S>,
    renderer: &mut Renderer,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command search");
    if args.is_empty() {
        return Err(anyhow!("search requires a query"));
    }
    let matches = store.search_widgets(&args.join(" "));
    if matches == 0 {
        println!("No matching widgets.");
        return Ok(());
    }
    renderer.print_widget_list(&store.search_results())
}

#[instrument(skip(store, renderer))]
fn cmd_categories<S: Storage>(
    store: &mut WidgetStore<S>,
    renderer: &mut Renderer,
) -> anyhow::Result<()> {
    info!("command categories");
    let rows: Vec<_> = store
        .categories()
        .iter()
        .map(|c| (c, store.visible_widgets(&c.id).len()))
        .collect();
    renderer.print_categories(&rows)
}

#[instrument(skip(store, view, renderer, args))]
fn cmd_widgets<S: Storage>(
    store: &mut WidgetStore<S>,
    view: &mut Dashboard,
    renderer: &mut Renderer,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command widgets");
    let category_id = category_arg(args, "widgets <category>")?;
    view.open_widget_picker();
    view.select_category(store, &category_id)?;

    let category = store
        .category(&category_id)
        .ok_or_else(|| anyhow!("unknown category: {category_id}"))?;
    renderer.print_picker(category, view.rows())
}

#[instrument(skip(store, view, args))]
fn cmd_add<S: Storage>(
    store: &mut WidgetStore<S>,
    view: &mut Dashboard,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command add");
    let category_id = category_arg(args, "add <category> <widget-id>...")?;
    let ids = &args[1..];
    if ids.is_empty() {
        return Err(anyhow!("add requires at least one widget id"));
    }

    view.open_widget_picker();
    view.select_category(store, &category_id)?;
    for id in ids {
        if !view.set_row_checked(&WidgetId::from(id.as_str()), true) {
            return Err(anyhow!(
                "widget {id} is not available in category {category_id}"
            ));
        }
    }

    let summary = view.confirm(store)?;
    println!(
        "Showing {} widget(s) in category {category_id}.",
        summary.added + summary.shown
    );
    Ok(())
}

#[instrument(skip(store, view, args))]
fn cmd_remove<S: Storage>(
    store: &mut WidgetStore<S>,
    view: &mut Dashboard,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command remove");
    let (category_id, widget_id) = category_and_widget(args, "remove <category> <widget-id>")?;

    if view.remove(store, &category_id, &widget_id)? {
        println!("Removed widget {widget_id} from category {category_id}.");
    } else {
        println!("Widget {widget_id} is not on category {category_id}.");
    }
    Ok(())
}

#[instrument(skip(store, view, args))]
fn cmd_new<S: Storage>(
    store: &mut WidgetStore<S>,
    view: &mut Dashboard,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command new");
    let category_id = category_arg(args, "new <category> <name> [content...]")?;
    let name = args.get(1).cloned().unwrap_or_default();
    let content = args.get(2..).map(|rest| rest.join(" ")).unwrap_or_default();

    view.open_new_widget_form();
    view.select_category(store, &category_id)?;
    view.set_draft_name(&name);
    view.set_draft_content(&content);
    let id = view.submit_new_widget(store, Utc::now())?;

    println!("Created widget {id}.");
    Ok(())
}

#[instrument(skip(store, args))]
fn cmd_toggle<S: Storage>(store: &mut WidgetStore<S>, args: &[String]) -> anyhow::Result<()> {
    info!("command toggle");
    let [id] = args else {
        return Err(anyhow!("usage: toggle <widget-id>"));
    };
    let widget_id = WidgetId::from(id.as_str());
    let status = store.toggle_widget_selection(&widget_id)?;
    println!(
        "Widget {widget_id} is now {}.",
        if status { "visible" } else { "hidden" }
    );
    Ok(())
}

#[instrument(skip(store, args))]
fn cmd_status<S: Storage>(store: &mut WidgetStore<S>, args: &[String]) -> anyhow::Result<()> {
    info!("command status");
    let usage = "status <category> <widget-id> on|off";
    let (category_id, widget_id) = category_and_widget(args, usage)?;
    let status = match args.get(2).map(|s| s.to_ascii_lowercase()).as_deref() {
        Some("on" | "show" | "true" | "1") => true,
        Some("off" | "hide" | "false" | "0") => false,
        _ => return Err(anyhow!("usage: {usage}")),
    };

    if store.update_widget_status(&category_id, &widget_id, status)? {
        println!("Updated widget {widget_id}.");
    } else {
        println!("Widget {widget_id} unchanged.");
    }
    Ok(())
}

#[instrument(skip(store))]
fn cmd_export<S: Storage>(store: &mut WidgetStore<S>) -> anyhow::Result<()> {
    info!("command export");
    let out = serde_json::to_string_pretty(&store.snapshot())
        .context("failed to serialize snapshot")?;
    println!("{out}");
    Ok(())
}

#[instrument(skip(store))]
fn cmd_reset<S: Storage>(store: &mut WidgetStore<S>) -> anyhow::Result<()> {
    info!("command reset");
    store.reset()?;
    println!("Stored layout cleared; the next run starts from the bootstrap widgets.");
    Ok(())
}

#[instrument(skip(cfg))]
fn cmd_show_config(cfg: &Config) -> anyhow::Result<()> {
    info!("command _show");
    let mut pairs: Vec<_> = cfg.iter().collect();
    pairs.sort();
    for (k, v) in pairs {
        println!("{k}={v}");
    }
    Ok(())
}

#[instrument]
fn cmd_help() -> anyhow::Result<()> {
    info!("command help");
    println!("dash [options] [command] [args]");
    println!();
    println!("  show [query...]                    dashboard cards, filtered by query");
    println!("  search <query...>                  widgets whose name matches");
    println!("  categories                         categories and visible counts");
    println!("  widgets <category>                 picker rows for a category");
    println!("  add <category> <widget-id>...      put widgets on a category card");
    println!("  remove <category> <widget-id>      take a widget off its card");
    println!("  new <category> <name> [content]    create a widget");
    println!("  toggle <widget-id>                 flip a widget's visibility");
    println!("  status <category> <widget-id> on|off");
    println!("  export                             print the stored snapshot");
    println!("  reset                              forget the stored layout");
    println!("  _show                              effective configuration");
    Ok(())
}

fn category_arg(args: &[String], usage: &str) -> anyhow::Result<CategoryId> {
    args.first()
        .map(|s| CategoryId::from(s.as_str()))
        .ok_or_else(|| anyhow!("usage: {usage}"))
}

fn category_and_widget(args: &[String], usage: &str) -> anyhow::Result<(CategoryId, WidgetId)> {
    match args {
        [category, widget, ..] => Ok((
            CategoryId::from(category.as_str()),
            WidgetId::from(widget.as_str()),
        )),
        _ => Err(anyhow!("usage: {usage}")),
    }
}
