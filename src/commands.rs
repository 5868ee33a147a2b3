use nondb::config::{NonDbConfig, load_config, write_config};
use nondb::ui::{self, Icons, stat_table, theme};
use nondb::{NonDb, Table};
use owo_colors::OwoColorize;
use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// An opened database plus the config that tells it which indices to attach
pub struct Session {
    db: NonDb,
    config: NonDbConfig,
    json: bool,
}

impl Session {
    /// Read the config at `config_path` and open the database it names.
    /// A missing file is only an error when it was asked for explicitly.
    pub fn load(
        config_path: &Path,
        explicit: bool,
        root: Option<PathBuf>,
        json: bool,
    ) -> anyhow::Result<Self> {
        let config = load_config(Some(config_path))?;
        if config.is_none() && explicit {
            anyhow::bail!("config file {} not found", config_path.display());
        }
        Self::open(root, config, json)
    }

    fn open(root: Option<PathBuf>, config: Option<NonDbConfig>, json: bool) -> anyhow::Result<Self> {
        let config = config.unwrap_or_default();
        let root = root.unwrap_or_else(|| config.root_path());
        let db = NonDb::with_options(root, config.options())?;
        Ok(Self { db, config, json })
    }

    /// Open a schemaless table with its configured key and indices attached
    fn table(&self, name: &str) -> anyhow::Result<Arc<Table<Value>>> {
        let table = self.db.table_named::<Value>(name, &self.config.key_for_table(name))?;
        for expr in self.config.indices_for_table(name) {
            table.index(expr)?;
        }
        Ok(table)
    }

    fn print_json(&self, value: &impl serde::Serialize) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

pub fn run_init(config_path: &Path, root: Option<PathBuf>, force: bool) -> anyhow::Result<()> {
    let root = root.unwrap_or_else(nondb::config::default_root_path);
    let config = NonDbConfig {
        root: Some(root.display().to_string()),
        ..Default::default()
    };
    write_config(config_path, &config, force)?;
    std::fs::create_dir_all(&root)?;

    ui::success(&format!("Wrote {}", config_path.display()));
    ui::info("Root", &root.display().style(theme().path).to_string());
    Ok(())
}

pub fn run_put(session: &Session, table: &str, record: Option<String>) -> anyhow::Result<()> {
    let text = match record {
        Some(text) => text,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let parsed: Value = serde_json::from_str(&text)?;
    let records = match parsed {
        Value::Array(items) => items,
        single => vec![single],
    };

    let table = session.table(table)?;
    let mut keys = Vec::with_capacity(records.len());
    for record in &records {
        keys.push(table.save(record)?);
    }

    if session.json {
        return session.print_json(&keys);
    }
    for key in &keys {
        println!("{} {}", Icons::FILE, key.style(theme().primary_key));
    }
    ui::success(&format!("Saved {} record(s) into {}", keys.len(), table.name()));
    Ok(())
}

pub fn run_get(session: &Session, table: &str, key: &str) -> anyhow::Result<()> {
    let record = session.table(table)?.fetch(key)?;
    session.print_json(&record)
}

pub fn run_delete(session: &Session, table: &str, key: &str) -> anyhow::Result<()> {
    if session.table(table)?.delete_key(key)? {
        ui::success(&format!("{} Deleted {}/{}", Icons::DEL, table, key));
    } else {
        ui::warn(&format!("No record {} in {}", key, table));
    }
    Ok(())
}

pub fn run_keys(session: &Session, table: &str) -> anyhow::Result<()> {
    let mut keys = session.table(table)?.keys()?;
    keys.sort();

    if session.json {
        return session.print_json(&keys);
    }
    for key in &keys {
        println!("{}", key.style(theme().primary_key));
    }
    Ok(())
}

pub fn run_list(session: &Session, table: &str) -> anyhow::Result<()> {
    let table = session.table(table)?;
    if session.json {
        return session.print_json(&table.all()?);
    }
    for record in table.records()? {
        println!("{}", serde_json::to_string(&record?)?);
    }
    Ok(())
}

pub fn run_find(session: &Session, table: &str, expr: &str, value: &str) -> anyhow::Result<()> {
    let table = session.table(table)?;
    let index = table.index(expr)?;
    let records = index.get(value)?;

    if session.json {
        return session.print_json(&records);
    }
    if records.is_empty() {
        ui::info("No records for", &format!("{} = {}", expr, value.style(theme().index_key)));
        if index.keys()?.is_empty() {
            ui::warn(&format!(
                "Index {} is empty; run `nondb index rebuild {} {}` to populate it",
                expr,
                table.name(),
                expr
            ));
        }
        return Ok(());
    }
    for record in &records {
        println!("{}", serde_json::to_string(record)?);
    }
    Ok(())
}

pub fn run_index_rebuild(session: &Session, table: &str, expr: &str) -> anyhow::Result<()> {
    let index = session.table(table)?.index(expr)?;
    let count = index.rebuild_index()?;
    ui::success(&format!("{} Rebuilt {} over {} record(s)", Icons::WRENCH, expr, count));
    if !session.config.is_indexed(table, expr) {
        ui::warn(&format!(
            "Index {} is not listed under [tables.{}] in the config; later puts will not maintain it",
            expr, table
        ));
    }
    Ok(())
}

pub fn run_index_vacuum(session: &Session, table: &str, expr: &str) -> anyhow::Result<()> {
    let index = session.table(table)?.index(expr)?;
    let report = index.vacuum_index()?;

    if session.json {
        return session.print_json(&report);
    }
    ui::success(&format!("{} Vacuumed {}: {}", Icons::BROOM, expr, report));
    Ok(())
}

pub fn run_index_remove(session: &Session, table: &str, expr: &str) -> anyhow::Result<()> {
    let index = session.table(table)?.index(expr)?;
    index.remove_index()?;
    ui::success(&format!("Removed index {} from {}", expr, table));
    Ok(())
}

pub fn run_stat(session: &Session, table: &str) -> anyhow::Result<()> {
    let stat = session.table(table)?.stat()?;
    if session.json {
        return session.print_json(&stat);
    }
    ui::header(&format!("{} {}", Icons::STATS, stat.record_type));
    println!("{}", stat_table(&stat));
    Ok(())
}

pub fn run_drop(session: &Session, table: &str, strict: bool) -> anyhow::Result<()> {
    session.db.drop_named(table, strict)?;
    ui::success(&format!("{} Dropped {}", Icons::DATABASE, table));
    Ok(())
}
