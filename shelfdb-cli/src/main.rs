use clap::{Parser, Subcommand};
use shelfdb::{Record, Store, StoreOptions, DEFAULT_QUERY};
use std::process;

/// shelfdb CLI — inspect and edit a shelfdb database from the command line
#[derive(Parser)]
#[command(name = "shelfdb", version, about)]
struct Cli {
    /// Application name the database root is resolved for
    #[arg(long, default_value = "shelfdb")]
    app: String,

    /// Explicit database directory (overrides the platform default)
    #[arg(long)]
    dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create one or more tables (idempotent)
    Create {
        /// Table names
        tables: Vec<String>,
    },

    /// Insert a record into a table
    Insert {
        /// Table name
        table: String,
        /// Field values (e.g. --field name=Sword --field power=7)
        #[arg(long = "field", value_parser = parse_key_value)]
        fields: Vec<(String, String)>,
    },

    /// Print every record of a table
    All {
        /// Table name
        table: String,
    },

    /// Project one field across a table
    Field {
        /// Table name
        table: String,
        /// Field name
        field: String,
    },

    /// Print the records matching a predicate
    Rows {
        /// Table name
        table: String,
        /// Equality conditions (e.g. --where kind=weapon)
        #[arg(long = "where", value_parser = parse_key_value)]
        conditions: Vec<(String, String)>,
    },

    /// Patch the record matching a predicate (last match wins)
    Update {
        /// Table name
        table: String,
        /// Equality conditions (e.g. --where name=Sword)
        #[arg(long = "where", value_parser = parse_key_value)]
        conditions: Vec<(String, String)>,
        /// Fields to set (e.g. --set power=9)
        #[arg(long = "set", value_parser = parse_key_value)]
        patch: Vec<(String, String)>,
    },

    /// Case-insensitive substring search over one field
    Search {
        /// Table name
        table: String,
        /// Field name
        field: String,
        /// Substring to look for
        keyword: String,
    },

    /// Delete every record matching a predicate
    Delete {
        /// Table name
        table: String,
        /// Equality conditions (e.g. --where kind=weapon)
        #[arg(long = "where", value_parser = parse_key_value)]
        conditions: Vec<(String, String)>,
    },

    /// Empty a table
    Clear {
        /// Table name
        table: String,
    },

    /// Count the records of a table
    Count {
        /// Table name
        table: String,
    },

    /// Check that every table file parses
    Validate,

    /// Evaluate a JSONPath expression against a table
    Query {
        /// Table name
        table: String,
        /// Path expression ("$" selects everything)
        #[arg(default_value = DEFAULT_QUERY)]
        expr: String,
    },
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("Invalid key=value pair: no '=' found in '{s}'"))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("ERROR:{e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut options = StoreOptions::new(&cli.app);
    if let Some(dir) = &cli.dir {
        options = options.directory(dir);
    }
    let store = Store::open(options)?;

    match cli.command {
        Command::Create { tables } => {
            store.create_table(&tables)?;
            print_output(&serde_json::json!({ "ok": true, "created": tables }));
        }

        Command::Insert { table, fields } => {
            let id = store.insert_one(&table, fields_to_record(&fields))?;
            print_output(&serde_json::json!({ "id": id }));
        }

        Command::All { table } => {
            let rows = store.get_all(&table)?;
            print_output(&serde_json::to_value(rows)?);
        }

        Command::Field { table, field } => {
            let values = store.get_field(&table, &field)?;
            print_output(&serde_json::Value::Array(values));
        }

        Command::Rows { table, conditions } => {
            let rows = store.get_rows(&table, &fields_to_record(&conditions))?;
            print_output(&serde_json::to_value(rows)?);
        }

        Command::Update {
            table,
            conditions,
            patch,
        } => {
            store.update_row(
                &table,
                &fields_to_record(&conditions),
                &fields_to_record(&patch),
            )?;
            print_output(&serde_json::json!({ "ok": true }));
        }

        Command::Search {
            table,
            field,
            keyword,
        } => {
            let rows = store.search(&table, &field, &keyword)?;
            print_output(&serde_json::to_value(rows)?);
        }

        Command::Delete { table, conditions } => {
            let removed = store.delete_row(&table, &fields_to_record(&conditions))?;
            print_output(&serde_json::json!({ "ok": true, "deleted": removed }));
        }

        Command::Clear { table } => {
            store.clear_table(&table)?;
            print_output(&serde_json::json!({ "ok": true, "cleared": table }));
        }

        Command::Count { table } => {
            let n = store.count(&table)?;
            print_output(&serde_json::json!({ "count": n }));
        }

        Command::Validate => {
            let ok = store.validate_all();
            print_output(&serde_json::json!({ "valid": ok }));
        }

        Command::Query { table, expr } => {
            let matched = store.query_path(&table, &expr)?;
            print_output(&serde_json::Value::Array(matched));
        }
    }

    Ok(())
}

fn print_output(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => eprintln!("ERROR:{e}"),
    }
}

fn fields_to_record(fields: &[(String, String)]) -> Record {
    let mut record = Record::new();
    for (key, val) in fields {
        // Try to parse as JSON first (numbers, booleans, arrays, objects)
        let json_val = serde_json::from_str(val).unwrap_or(serde_json::Value::String(val.clone()));
        record.insert(key.clone(), json_val);
    }
    record
}
