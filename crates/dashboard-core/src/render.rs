use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::model::{Category, Widget};
use crate::view::{CategoryCard, PickerRow};

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self {
            color: color && io::stdout().is_terminal(),
        })
    }

    #[tracing::instrument(skip(self, cards))]
    pub fn print_cards(&mut self, cards: &[CategoryCard]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_cards(&mut out, cards)
    }

    pub fn write_cards<W: Write>(&self, mut out: W, cards: &[CategoryCard]) -> anyhow::Result<()> {
        if cards.is_empty() {
            writeln!(out, "No matching widgets.")?;
            return Ok(());
        }

        for (idx, card) in cards.iter().enumerate() {
            if idx > 0 {
                writeln!(out)?;
            }
            writeln!(out, "{} ({})", self.paint(&card.name, "1"), card.id)?;

            if card.widgets.is_empty() {
                writeln!(out, "  (no widgets)")?;
                continue;
            }

            let rows = card
                .widgets
                .iter()
                .map(|w| vec![self.paint(w.id.as_str(), "33"), w.name.clone(), w.content.clone()])
                .collect();
            write_table(&mut out, headers(&["ID", "Name", "Content"]), rows)?;
        }

        Ok(())
    }

    #[tracing::instrument(skip(self, rows))]
    pub fn print_picker(&mut self, category: &Category, rows: &[PickerRow]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_picker(&mut out, category, rows)
    }

    pub fn write_picker<W: Write>(
        &self,
        mut out: W,
        category: &Category,
        rows: &[PickerRow],
    ) -> anyhow::Result<()> {
        writeln!(out, "{} ({})", self.paint(&category.name, "1"), category.id)?;
        if rows.is_empty() {
            writeln!(out, "No widgets available for this category.")?;
            return Ok(());
        }

        let table = rows
            .iter()
            .map(|row| {
                let mark = if row.checked { "[x]" } else { "[ ]" };
                vec![
                    mark.to_string(),
                    self.paint(row.widget.id.as_str(), "33"),
                    row.widget.name.clone(),
                ]
            })
            .collect();
        write_table(&mut out, headers(&["", "ID", "Name"]), table)
    }

    #[tracing::instrument(skip(self, widgets))]
    pub fn print_widget_list(&mut self, widgets: &[&Widget]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let rows = widgets
            .iter()
            .map(|w| {
                let visible = if w.status { "yes" } else { "no" };
                vec![
                    self.paint(w.id.as_str(), "33"),
                    w.category_id.to_string(),
                    w.name.clone(),
                    visible.to_string(),
                ]
            })
            .collect();
        write_table(&mut out, headers(&["ID", "Category", "Name", "Visible"]), rows)
    }

    #[tracing::instrument(skip(self, categories))]
    pub fn print_categories(&mut self, categories: &[(&Category, usize)]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let rows = categories
            .iter()
            .map(|(category, visible)| {
                vec![
                    self.paint(category.id.as_str(), "33"),
                    category.name.clone(),
                    visible.to_string(),
                ]
            })
            .collect();
        write_table(&mut out, headers(&["ID", "Name", "Visible"]), rows)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn headers(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::{Renderer, strip_ansi, write_table};
    use crate::config::Config;
    use crate::model::{Category, Widget};
    use crate::view::{CategoryCard, PickerRow};

    fn plain() -> Renderer {
        let mut cfg = Config::default();
        cfg.apply_overrides(vec![("color".to_string(), "off".to_string())]);
        Renderer::new(&cfg).expect("renderer")
    }

    #[test]
    fn table_pads_by_visible_width() {
        let mut buf = Vec::new();
        write_table(
            &mut buf,
            vec!["ID".to_string(), "Name".to_string()],
            vec![vec!["\x1b[33m12\x1b[0m".to_string(), "Scan Results".to_string()]],
        )
        .expect("write table");
        let text = String::from_utf8(buf).expect("utf8");
        let lines: Vec<_> = text.lines().map(strip_ansi).collect();
        assert_eq!(lines[0], "ID Name         ");
        assert_eq!(lines[1], "-- ------------ ");
        assert_eq!(lines[2], "12 Scan Results ");
    }

    #[test]
    fn cards_list_widgets_or_placeholder() {
        let cards = vec![
            CategoryCard {
                id: "1".into(),
                name: "CSPM Executive Dashboard".to_string(),
                widgets: vec![Widget::new("1", "Security Overview", "metrics", "1", true)],
            },
            CategoryCard {
                id: "2".into(),
                name: "CWPP Dashboard".to_string(),
                widgets: vec![],
            },
        ];

        let mut buf = Vec::new();
        plain().write_cards(&mut buf, &cards).expect("write cards");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.starts_with("CSPM Executive Dashboard (1)\n"));
        assert!(text.contains("Security Overview"));
        assert!(text.contains("CWPP Dashboard (2)\n  (no widgets)\n"));
    }

    #[test]
    fn picker_marks_checked_rows() {
        let category = Category::new("3", "Registry Scan");
        let rows = vec![
            PickerRow {
                widget: Widget::new("11", "Scan Results", "", "3", true),
                checked: true,
            },
            PickerRow {
                widget: Widget::new("13", "Image Risk Assessment", "", "3", false),
                checked: false,
            },
        ];

        let mut buf = Vec::new();
        plain()
            .write_picker(&mut buf, &category, &rows)
            .expect("write picker");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.contains("[x] 11 Scan Results"));
        assert!(text.contains("[ ] 13 Image Risk Assessment"));
    }

    #[test]
    fn invalid_color_setting_is_rejected() {
        let mut cfg = Config::default();
        cfg.apply_overrides(vec![("color".to_string(), "sometimes".to_string())]);
        assert!(Renderer::new(&cfg).is_err());
    }
}
