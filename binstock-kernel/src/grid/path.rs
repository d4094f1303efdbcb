//! Sweep paths through a cabinet grid.

use binstock_api::{Cabinet, CellRef, Direction, iter_cols_upto, MAX_ROWS};

/// Every cell of `cabinet` exactly once, in `direction` order, beginning at
/// `start` and wrapping around past the last cell.
///
/// `Horizontal` walks a row left to right, then the next row; `Vertical`
/// walks a column top to bottom, then the next column.
pub fn walk_path(cabinet: &Cabinet, start: CellRef, direction: Direction) -> Vec<CellRef> {
    let rows = 1..=cabinet.rows_max.min(MAX_ROWS);
    let cols: Vec<_> = iter_cols_upto(cabinet.cols_max).collect();

    let mut path = Vec::with_capacity(rows.clone().count() * cols.len());
    match direction {
        Direction::Horizontal => {
            for row in rows {
                path.extend(cols.iter().map(|&col| CellRef { col, row }));
            }
        }
        Direction::Vertical => {
            for &col in &cols {
                path.extend(rows.clone().map(|row| CellRef { col, row }));
            }
        }
    }

    if let Some(offset) = path.iter().position(|c| *c == start) {
        path.rotate_left(offset);
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use binstock_api::{CabinetId, ColumnCode, LocationId};

    fn cabinet() -> Cabinet {
        Cabinet {
            id: CabinetId(1),
            location_id: LocationId(1),
            name: "C1".into(),
            rows_max: 2,
            cols_max: ColumnCode::new("C").unwrap(),
            compartments_per_slot: 6,
        }
    }

    fn codes(path: &[CellRef]) -> Vec<String> {
        path.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_horizontal_wraps_from_start() {
        let path = walk_path(&cabinet(), CellRef::parse("B", 2).unwrap(), Direction::Horizontal);
        assert_eq!(codes(&path), ["B2", "C2", "A1", "B1", "C1", "A2"]);
    }

    #[test]
    fn test_vertical_is_column_major() {
        let path = walk_path(&cabinet(), CellRef::parse("A", 1).unwrap(), Direction::Vertical);
        assert_eq!(codes(&path), ["A1", "A2", "B1", "B2", "C1", "C2"]);
    }
}
