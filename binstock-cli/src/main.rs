//! Binstock - command line front end for the placement kernel.
//!
//! Every subcommand prints one JSON document on stdout.

mod cli;
mod logging;

use anyhow::Result;
use binstock_api::{
    AutoAssignRequest, CabinetId, CategoryId, CellRef, ColumnCode, ItemId, LocationId, MergeId,
    NewItem,
};
use binstock_kernel::{AssignOptions, Kernel, KernelConfig};
use clap::Parser;
use serde_json::{Value, json};

use crate::cli::{
    Args, AutoAssignArgs, CabinetCommand, CategoryCommand, CellArgs, Command, ItemCommand,
    LocationCommand, MergeCommand,
};
use crate::logging::setup_logging;

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    setup_logging(args.verbose);

    let mut config = KernelConfig::from_env()?;
    if let Some(db) = args.db {
        config = config.with_db_path(db);
    }
    let (mut kernel, mut events) = Kernel::open(config)?;
    let output = run(&mut kernel, args.command)?;

    while let Ok(event) = events.try_recv() {
        tracing::info!(?event, "placement event");
    }

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run(kernel: &mut Kernel, command: Command) -> Result<Value> {
    let value = match command {
        Command::Init => json!({ "db_path": kernel.config().db_path }),

        Command::Location(LocationCommand::Add { name }) => json!(kernel.add_location(&name)?),
        Command::Location(LocationCommand::List) => json!(kernel.list_locations()?),

        Command::Cabinet(CabinetCommand::Add {
            location,
            name,
            rows,
            cols,
            compartments,
        }) => {
            let mut fields = kernel.new_cabinet(LocationId(location), &name);
            if let Some(rows) = rows {
                fields.rows_max = rows;
            }
            if let Some(cols) = cols {
                fields.cols_max = ColumnCode::new(&cols)?;
            }
            if let Some(compartments) = compartments {
                fields.compartments_per_slot = compartments;
            }
            json!(kernel.add_cabinet(&fields)?)
        }
        Command::Cabinet(CabinetCommand::List) => json!(kernel.list_cabinets()?),

        Command::Category(CategoryCommand::Add { name, color }) => {
            json!(kernel.add_category(&name, &color)?)
        }
        Command::Category(CategoryCommand::List) => json!(kernel.list_categories()?),

        Command::Item(ItemCommand::Add {
            category,
            name,
            measure,
            material,
            size,
            quantity,
            exclusive,
        }) => {
            let fields = NewItem {
                thread_size: measure,
                material,
                main_size_mm: size,
                quantity,
                share_drawer: !exclusive,
                ..NewItem::new(CategoryId(category), name)
            };
            json!(kernel.add_item(&fields)?)
        }
        Command::Item(ItemCommand::Show { item }) => {
            let id = ItemId(item);
            json!({
                "item": kernel.get_item(id)?,
                "position": kernel.item_position(id)?,
            })
        }

        Command::Assign { item, at, force_share } => {
            let options = AssignOptions { force_share };
            json!(kernel.assign_position(ItemId(item), CabinetId(at.cabinet), &at.col, at.row, options)?)
        }
        Command::Clear { item } => json!({ "cleared": kernel.clear_position(ItemId(item))? }),
        Command::Move {
            cabinet,
            from_col,
            from_row,
            to_col,
            to_row,
            swap,
        } => {
            let cabinet = CabinetId(cabinet);
            let moved = kernel.move_slot((cabinet, &from_col, from_row), (cabinet, &to_col, to_row), swap)?;
            json!({ "moved": moved, "swap": swap })
        }
        Command::Suggest { item } => json!({ "position": kernel.suggest_position(ItemId(item))? }),
        Command::CheckShare { item, at } => {
            json!(kernel.check_share(ItemId(item), CabinetId(at.cabinet), &at.col, at.row)?)
        }
        Command::AutoAssign(auto) => {
            let request = auto_assign_request(&auto)?;
            let report = kernel.auto_assign_category(&request)?;
            if report.is_partial() {
                tracing::warn!(
                    "placed {} of {} requested items",
                    report.assigned,
                    report.requested
                );
            }
            json!(report)
        }

        Command::Contents { at } => json!(kernel.slot_contents(CabinetId(at.cabinet), &at.col, at.row)?),
        Command::Grid { cabinet } => json!(kernel.cabinet_grid(CabinetId(cabinet))?),

        Command::Merge(MergeCommand::Add {
            cabinet,
            col_start,
            col_end,
            row_start,
            row_end,
        }) => json!(kernel.create_merge(CabinetId(cabinet), &col_start, &col_end, row_start, row_end)?),
        Command::Merge(MergeCommand::Delete { merge }) => {
            kernel.delete_merge(MergeId(merge))?;
            json!({ "deleted": merge })
        }
        Command::Merge(MergeCommand::List { cabinet }) => json!(kernel.list_merges(CabinetId(cabinet))?),

        Command::Block { at } => block_result(kernel, at, true)?,
        Command::Unblock { at } => block_result(kernel, at, false)?,

        Command::Unplaced { category } => json!(kernel.unplaced_items(category.map(CategoryId))?),
    };
    Ok(value)
}

fn block_result(kernel: &mut Kernel, at: CellArgs, blocked: bool) -> Result<Value> {
    let cabinet = CabinetId(at.cabinet);
    let cells = if blocked {
        kernel.block_cell(cabinet, &at.col, at.row)?
    } else {
        kernel.unblock_cell(cabinet, &at.col, at.row)?
    };
    Ok(json!({ "blocked": blocked, "cells": cells }))
}

fn auto_assign_request(args: &AutoAssignArgs) -> Result<AutoAssignRequest> {
    Ok(AutoAssignRequest {
        category_id: CategoryId(args.category),
        cabinet_id: CabinetId(args.cabinet),
        start: CellRef::parse(&args.col, args.row)?,
        direction: args.direction,
        primary: args.primary,
        secondary: args.secondary,
        count: args.count,
        clear_occupied: args.clear,
    })
}
