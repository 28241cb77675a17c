pub mod bootstrap;
pub mod cli;
pub mod commands;
pub mod config;
pub mod model;
pub mod render;
pub mod snapshot;
pub mod storage;
pub mod store;
pub mod view;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info,
  warn
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting dashboard CLI"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.dashrc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );
  cfg.validate()?;

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let storage =
    storage::FileStorage::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open storage at {}",
        data_dir.display()
      )
    })?;

  let options = cfg.store_options()?;
  let bootstrap =
    bootstrap::Bootstrap::from_config(
      &cfg
    )?;

  let mut store =
    store::WidgetStore::new(
      storage, options
    );
  let source =
    store.load_initial_data(&bootstrap);
  if source
    == store::LoadSource::Unchanged
  {
    warn!(
      "no widget data loaded; starting \
       with an empty dashboard"
    );
  }

  let mut view = view::Dashboard::new(
    cfg
      .get_bool("new.visible")
      .unwrap_or(true)
  );
  let mut renderer =
    render::Renderer::new(&cfg)?;
  let inv = cli::Invocation::parse(
    &cfg, cli.rest
  )?;

  commands::dispatch(
    &mut store,
    &mut view,
    &cfg,
    &mut renderer,
    inv
  )?;

  info!("done");
  Ok(())
}
