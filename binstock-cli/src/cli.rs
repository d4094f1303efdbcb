use std::path::PathBuf;

use binstock_api::{Direction, SortKey};
use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about = "Cabinet slot and compartment allocation", long_about = None)]
pub struct Args {
    /// Database file (overrides BINSTOCK_DB and the config file)
    #[arg(long, global = true, value_name = "FILE")]
    pub db: Option<PathBuf>,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the database and its schema
    Init,

    /// Manage storage locations
    #[command(subcommand)]
    Location(LocationCommand),

    /// Manage cabinets
    #[command(subcommand)]
    Cabinet(CabinetCommand),

    /// Manage item categories
    #[command(subcommand)]
    Category(CategoryCommand),

    /// Manage items
    #[command(subcommand)]
    Item(ItemCommand),

    /// Place an item into the drawer containing a cell
    Assign {
        item: i64,
        #[command(flatten)]
        at: CellArgs,
        /// Grant share consent on behalf of the current occupants
        #[arg(long)]
        force_share: bool,
    },

    /// Remove an item from its drawer
    Clear { item: i64 },

    /// Move a drawer's content to another drawer of the same cabinet
    Move {
        cabinet: i64,
        #[arg(value_parser = column_arg)]
        from_col: String,
        from_row: u32,
        #[arg(value_parser = column_arg)]
        to_col: String,
        to_row: u32,
        /// Exchange the two drawers' content
        #[arg(long)]
        swap: bool,
    },

    /// First compatible drawer with a free compartment
    Suggest { item: i64 },

    /// Check whether an item may share a drawer without placing it
    CheckShare {
        item: i64,
        #[command(flatten)]
        at: CellArgs,
    },

    /// Place unplaced items of a category along a sweep path
    AutoAssign(AutoAssignArgs),

    /// What the drawer containing a cell holds
    Contents {
        #[command(flatten)]
        at: CellArgs,
    },

    /// Occupied, blocked and merged cells of a cabinet
    Grid { cabinet: i64 },

    /// Manage drawer merges
    #[command(subcommand)]
    Merge(MergeCommand),

    /// Mark a drawer unusable
    Block {
        #[command(flatten)]
        at: CellArgs,
    },

    /// Make a blocked drawer usable again
    Unblock {
        #[command(flatten)]
        at: CellArgs,
    },

    /// Items without a placement
    Unplaced {
        #[arg(long)]
        category: Option<i64>,
    },
}

/// A cell of a cabinet: `<cabinet> <col> <row>`.
#[derive(ClapArgs, Debug)]
pub struct CellArgs {
    pub cabinet: i64,
    #[arg(value_parser = column_arg)]
    pub col: String,
    pub row: u32,
}

#[derive(Subcommand, Debug)]
pub enum LocationCommand {
    Add { name: String },
    List,
}

#[derive(Subcommand, Debug)]
pub enum CabinetCommand {
    Add {
        /// Owning location
        #[arg(long)]
        location: i64,
        name: String,
        #[arg(long)]
        rows: Option<u32>,
        /// Last column code, e.g. "F" or "AB"
        #[arg(long, value_parser = column_arg)]
        cols: Option<String>,
        /// Compartments per single cell
        #[arg(long)]
        compartments: Option<u32>,
    },
    List,
}

#[derive(Subcommand, Debug)]
pub enum CategoryCommand {
    Add {
        name: String,
        /// "#rrggbb"
        #[arg(long, default_value = "#999999")]
        color: String,
    },
    List,
}

#[derive(Subcommand, Debug)]
pub enum ItemCommand {
    Add {
        #[arg(long)]
        category: i64,
        name: String,
        /// Thread size, e.g. "M3"
        #[arg(long)]
        measure: Option<String>,
        #[arg(long)]
        material: Option<String>,
        /// Main size in millimetres
        #[arg(long)]
        size: Option<f64>,
        #[arg(long, default_value_t = 0)]
        quantity: i64,
        /// Refuse to share a drawer with other items
        #[arg(long)]
        exclusive: bool,
    },
    Show { item: i64 },
}

#[derive(Subcommand, Debug)]
pub enum MergeCommand {
    Add {
        cabinet: i64,
        #[arg(value_parser = column_arg)]
        col_start: String,
        #[arg(value_parser = column_arg)]
        col_end: String,
        row_start: u32,
        row_end: u32,
    },
    Delete { merge: i64 },
    List { cabinet: i64 },
}

#[derive(ClapArgs, Debug)]
pub struct AutoAssignArgs {
    #[arg(long)]
    pub category: i64,
    #[arg(long)]
    pub cabinet: i64,
    /// Start column
    #[arg(long, value_parser = column_arg, default_value = "A")]
    pub col: String,
    /// Start row
    #[arg(long, default_value_t = 1)]
    pub row: u32,
    /// H (row-major) or V (column-major)
    #[arg(long, default_value = "H")]
    pub direction: Direction,
    #[arg(long, default_value = "measure")]
    pub primary: SortKey,
    #[arg(long, default_value = "id")]
    pub secondary: SortKey,
    /// Maximum number of items to place
    #[arg(long, default_value_t = u32::MAX)]
    pub count: u32,
    /// Reclaim occupied cells on the path
    #[arg(long)]
    pub clear: bool,
}

/// Column codes are stored uppercase.
fn column_arg(raw: &str) -> Result<String, String> {
    let code = raw.trim().to_ascii_uppercase();
    if binstock_api::column_code_valid(&code) {
        Ok(code)
    } else {
        Err(format!("invalid column code {:?}", raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_arg_uppercases() {
        assert_eq!(column_arg("ab").unwrap(), "AB");
        assert!(column_arg("a1").is_err());
        assert!(column_arg("").is_err());
    }

    #[test]
    fn test_parse_assign() {
        let args = Args::try_parse_from(["binstock", "--db", "x.db", "assign", "7", "1", "b", "3", "--force-share"])
            .unwrap();
        assert_eq!(args.db, Some(PathBuf::from("x.db")));
        match args.command {
            Command::Assign { item, at, force_share } => {
                assert_eq!(item, 7);
                assert_eq!(at.cabinet, 1);
                assert_eq!(at.col, "B");
                assert_eq!(at.row, 3);
                assert!(force_share);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_auto_assign_defaults() {
        let args = Args::try_parse_from(["binstock", "auto-assign", "--category", "2", "--cabinet", "1", "--direction", "V"])
            .unwrap();
        let Command::AutoAssign(auto) = args.command else {
            panic!("expected auto-assign");
        };
        assert_eq!(auto.direction, Direction::Vertical);
        assert_eq!(auto.primary, SortKey::Measure);
        assert_eq!(auto.col, "A");
        assert_eq!(auto.row, 1);
        assert!(!auto.clear);
    }
}
