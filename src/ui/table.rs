use crate::table::TableStat;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Field")]
    pub field: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

#[derive(Default)]
pub struct TableBuilder {
    rows: Vec<TableRow>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_row(&mut self, label: &str, value: &str) {
        self.rows.push(TableRow {
            field: label.to_string(),
            value: value.to_string(),
        });
    }

    pub fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }

        Table::new(&self.rows).with(Style::rounded()).to_string()
    }
}

pub fn stat_table(stat: &TableStat) -> String {
    let indices = if stat.indices.is_empty() {
        "-".to_string()
    } else {
        stat.indices.join(", ")
    };

    let mut builder = TableBuilder::new();
    builder.add_row("Path", &stat.path.display().to_string());
    builder.add_row("Record type", &stat.record_type);
    builder.add_row("Key", &stat.key_expr);
    builder.add_row("Records", &stat.num_records.to_string());
    builder.add_row("Indices", &indices);
    builder.build()
}
