use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::store::{
  RemoveMode,
  StoreOptions
};

#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let mut map = HashMap::new();
    for (k, v) in [
      ("data.location", "~/.dashboard"),
      ("storage.key", "widgetStore"),
      ("bootstrap", "builtin"),
      ("bootstrap.timeout", "10"),
      ("remove.mode", "unlink"),
      ("new.visible", "on"),
      ("default.command", "show"),
      ("color", "on")
    ] {
      map.insert(
        k.to_string(),
        v.to_string()
      );
    }

    Self {
      map,
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    dashrc_override
  ))]
  pub fn load(
    dashrc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    let dashrc = resolve_dashrc_path(
      dashrc_override
    )?;
    if let Some(path) = dashrc {
      info!(dashrc = %path.display(), "loading dashrc");
      cfg.load_file(&path)?;
    } else {
      warn!(
        "no dashrc found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> Option<bool> {
    self
      .map
      .get(key)
      .map(|v| {
        bool_word(v).unwrap_or(false)
      })
  }

  pub fn get_u64(
    &self,
    key: &str
  ) -> anyhow::Result<Option<u64>> {
    self
      .map
      .get(key)
      .map(|v| {
        v.trim().parse::<u64>().map_err(
          |_| {
            anyhow!(
              "{key} must be a whole \
               number, got {v:?}"
            )
          }
        )
      })
      .transpose()
  }

  pub fn iter(
    &self
  ) -> impl Iterator<Item = (&String, &String)>
  {
    self.map.iter()
  }

  pub fn store_options(
    &self
  ) -> anyhow::Result<StoreOptions> {
    let remove_mode = match self
      .get("remove.mode")
    {
      Some(raw) => raw
        .parse::<RemoveMode>()
        .context(
          "invalid remove.mode"
        )?,
      None => RemoveMode::default()
    };

    let key = self
      .get("storage.key")
      .unwrap_or_else(|| {
        "widgetStore".to_string()
      });

    Ok(StoreOptions {
      key,
      remove_mode
    })
  }

  /// Checks every key against the known
  /// table and the typed keys' values.
  /// Run after overrides are applied.
  pub fn validate(
    &self
  ) -> anyhow::Result<()> {
    let mut unknown: Vec<&String> = self
      .map
      .keys()
      .filter(|k| {
        !is_known_key(k)
      })
      .collect();
    if !unknown.is_empty() {
      unknown.sort();
      return Err(anyhow!(
        "unknown config keys: {}",
        unknown
          .iter()
          .map(|k| k.as_str())
          .collect::<Vec<_>>()
          .join(", ")
      ));
    }

    self.get_u64("bootstrap.timeout")?;
    self.store_options()?;
    if let Some(raw) =
      self.get("new.visible")
      && bool_word(&raw).is_none()
    {
      return Err(anyhow!(
        "new.visible must be on or \
         off, got {raw:?}"
      ));
    }
    Ok(())
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;
    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(Path::to_path_buf)
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (idx, raw_line) in
      text.lines().enumerate()
    {
      let at = || {
        format!(
          "{}:{}",
          path.display(),
          idx + 1
        )
      };
      match parse_rc_line(raw_line)
        .with_context(at)?
      {
        RcLine::Blank => {}
        RcLine::Include(include) => {
          let target = if include
            .is_absolute()
          {
            include
          } else {
            base_dir.join(include)
          };
          if target.exists() {
            debug!(include = %target.display(), "following include");
            self.load_file(&target)?;
          } else {
            warn!(include = %target.display(), "include file does not exist; skipping");
          }
        }
        RcLine::Setting(key, value) => {
          trace!(key = %key, value = %value, "loaded config key");
          self.map.insert(key, value);
        }
      }
    }

    Ok(())
  }
}

const KNOWN_KEYS: [&str; 8] = [
  "data.location",
  "storage.key",
  "bootstrap",
  "bootstrap.timeout",
  "remove.mode",
  "new.visible",
  "default.command",
  "color"
];

fn is_known_key(key: &str) -> bool {
  KNOWN_KEYS.contains(&key)
}

#[derive(Debug, PartialEq, Eq)]
enum RcLine {
  Blank,
  Include(PathBuf),
  Setting(String, String)
}

fn parse_rc_line(
  raw: &str
) -> anyhow::Result<RcLine> {
  let line = raw
    .split_once('#')
    .map_or(raw, |(before, _)| before)
    .trim();
  if line.is_empty() {
    return Ok(RcLine::Blank);
  }

  if let Some(rest) =
    line.strip_prefix("include ")
  {
    let rest = rest.trim();
    if rest.is_empty() {
      return Err(anyhow!(
        "include path cannot be empty"
      ));
    }
    return Ok(RcLine::Include(
      expand_tilde(Path::new(rest))
    ));
  }

  let (k, v) =
    line.split_once('=').ok_or_else(
      || {
        anyhow!(
          "expected key = value, got \
           {line:?}"
        )
      }
    )?;
  let key = k.trim();
  if !is_known_key(key) {
    return Err(anyhow!(
      "unknown config key {key:?}"
    ));
  }
  Ok(RcLine::Setting(
    key.to_string(),
    v.trim().to_string()
  ))
}

#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = if let Some(path) =
    override_dir
  {
    path.to_path_buf()
  } else if let Some(cfg_value) =
    cfg.get("data.location")
  {
    expand_tilde(Path::new(&cfg_value))
  } else {
    home()?.join(".dashboard")
  };

  if !dir.exists() {
    info!(dir = %dir.display(), "creating data directory");
    fs::create_dir_all(&dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
  }

  Ok(dir)
}

fn resolve_dashrc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  match std::env::var("DASHRC") {
    Ok(env) if env == "/dev/null" => {
      Ok(None)
    }
    Ok(env) => {
      Ok(Some(PathBuf::from(env)))
    }
    Err(_) => {
      let candidate =
        home()?.join(".dashrc");
      Ok(candidate
        .exists()
        .then_some(candidate))
    }
  }
}

fn home() -> anyhow::Result<PathBuf> {
  dirs::home_dir().ok_or_else(|| {
    anyhow!(
      "cannot determine home \
       directory"
    )
  })
}

pub(crate) fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn bool_word(s: &str) -> Option<bool> {
  match s
    .trim()
    .to_ascii_lowercase()
    .as_str()
  {
    "1" | "y" | "yes" | "on" | "true" => {
      Some(true)
    }
    "0" | "n" | "no" | "off"
    | "false" => Some(false),
    _ => None
  }
}

#[cfg(test)]
mod tests {
  use std::fs;

  use tempfile::tempdir;

  use std::path::PathBuf;

  use super::{
    Config,
    RcLine,
    parse_rc_line
  };
  use crate::store::RemoveMode;

  #[test]
  fn rc_file_with_include_and_comments()
  {
    let temp =
      tempdir().expect("tempdir");
    let extra =
      temp.path().join("extra.rc");
    fs::write(
      &extra,
      "remove.mode = delete\n"
    )
    .expect("write include");

    let rc = temp.path().join("dashrc");
    fs::write(
      &rc,
      "# dashboard settings\n\
       storage.key = layout # inline \
       comment\n\
       include extra.rc\n\
       include missing.rc\n"
    )
    .expect("write rc");

    let cfg = Config::load(Some(rc.as_path()))
      .expect("load config");
    assert_eq!(cfg.loaded_files.len(), 2);

    let opts = cfg
      .store_options()
      .expect("store options");
    assert_eq!(opts.key, "layout");
    assert_eq!(
      opts.remove_mode,
      RemoveMode::Delete
    );
    assert_eq!(
      cfg.get("color").as_deref(),
      Some("on")
    );
  }

  #[test]
  fn overrides_strip_rc_prefix() {
    let mut cfg = Config::default();
    cfg.apply_overrides(vec![
      (
        "rc.new.visible".to_string(),
        "off".to_string()
      ),
      (
        "bootstrap.timeout".to_string(),
        "3".to_string()
      ),
    ]);
    assert_eq!(
      cfg.get_bool("new.visible"),
      Some(false)
    );
    assert_eq!(
      cfg
        .get_u64("bootstrap.timeout")
        .expect("timeout"),
      Some(3)
    );
  }

  #[test]
  fn malformed_line_is_an_error() {
    let temp =
      tempdir().expect("tempdir");
    let rc = temp.path().join("dashrc");
    fs::write(&rc, "not a setting\n")
      .expect("write rc");
    assert!(
      Config::load(Some(rc.as_path())).is_err()
    );
  }

  #[test]
  fn rc_lines_are_classified() {
    assert_eq!(
      parse_rc_line("  # note")
        .expect("comment"),
      RcLine::Blank
    );
    assert_eq!(
      parse_rc_line(
        "include /etc/dash.rc"
      )
      .expect("include"),
      RcLine::Include(PathBuf::from(
        "/etc/dash.rc"
      ))
    );
    assert_eq!(
      parse_rc_line("color=off # tty")
        .expect("setting"),
      RcLine::Setting(
        "color".to_string(),
        "off".to_string()
      )
    );
    assert!(
      parse_rc_line("include ").is_err()
    );
  }

  #[test]
  fn unknown_key_in_rc_file_names_the_line()
  {
    let temp =
      tempdir().expect("tempdir");
    let rc = temp.path().join("dashrc");
    fs::write(
      &rc,
      "color = off\ncolour = on\n"
    )
    .expect("write rc");
    let err =
      Config::load(Some(rc.as_path()))
        .expect_err("unknown key");
    let msg = format!("{err:#}");
    assert!(msg.contains("dashrc:2"));
    assert!(msg.contains("colour"));
  }

  #[test]
  fn validate_checks_overrides() {
    let mut cfg = Config::default();
    cfg
      .validate()
      .expect("defaults are valid");

    cfg.apply_overrides(vec![(
      "rc.new.visible".to_string(),
      "maybe".to_string()
    )]);
    assert!(cfg.validate().is_err());

    let mut cfg = Config::default();
    cfg.apply_overrides(vec![(
      "remove.modes".to_string(),
      "delete".to_string()
    )]);
    let err = cfg
      .validate()
      .expect_err("unknown key");
    assert!(
      err
        .to_string()
        .contains("remove.modes")
    );
  }

  #[test]
  fn unknown_remove_mode_is_rejected()
  {
    let mut cfg = Config::default();
    cfg.apply_overrides(vec![(
      "remove.mode".to_string(),
      "purge".to_string()
    )]);
    assert!(
      cfg.store_options().is_err()
    );
  }
}
