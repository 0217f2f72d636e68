// Static cell-code dataset loaded from JSON. One character per cell, row-major.

use serde::Deserialize;

use crate::error::EngineError;
use crate::transform::GridGeometry;
use crate::types::CellCoord;

/// A row is either an array of one-character strings or a plain string.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawRow {
    Codes(Vec<char>),
    Text(String),
}

impl RawRow {
    fn into_codes(self) -> Vec<char> {
        match self {
            RawRow::Codes(codes) => codes,
            RawRow::Text(text) => text.chars().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridDataset {
    columns: usize,
    rows: usize,
    codes: Vec<char>,
}

impl GridDataset {
    /// Parse and validate a dataset against the configured grid size.
    pub fn from_json(json: &str, geometry: &GridGeometry) -> Result<Self, EngineError> {
        let raw: Vec<RawRow> = serde_json::from_str(json)
            .map_err(|e| EngineError::InvalidGrid(e.to_string()))?;
        Self::from_rows(raw.into_iter().map(RawRow::into_codes).collect(), geometry)
    }

    pub fn from_rows(rows: Vec<Vec<char>>, geometry: &GridGeometry) -> Result<Self, EngineError> {
        let expected_columns = geometry.columns as usize;
        let expected_rows = geometry.rows as usize;
        let ragged = rows.iter().position(|row| row.len() != expected_columns);
        if rows.len() != expected_rows || ragged.is_some() {
            let columns = ragged
                .and_then(|index| rows.get(index))
                .or_else(|| rows.first())
                .map_or(0, Vec::len);
            return Err(EngineError::GridDimensions {
                columns,
                rows: rows.len(),
                expected_columns: geometry.columns,
                expected_rows: geometry.rows,
            });
        }
        Ok(GridDataset {
            columns: expected_columns,
            rows: expected_rows,
            codes: rows.into_iter().flatten().collect(),
        })
    }

    /// Dataset filled with a single code.
    pub fn uniform(geometry: &GridGeometry, code: char) -> Self {
        let columns = geometry.columns as usize;
        let rows = geometry.rows as usize;
        GridDataset {
            columns,
            rows,
            codes: vec![code; columns * rows],
        }
    }

    pub fn code_at(&self, cell: CellCoord) -> Option<char> {
        let x = usize::try_from(cell.x).ok()?;
        let y = usize::try_from(cell.y).ok()?;
        if x >= self.columns || y >= self.rows {
            return None;
        }
        self.codes.get(y * self.columns + x).copied()
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn rows(&self) -> usize {
        self.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> GridGeometry {
        GridGeometry::new(3, 2, 10.0)
    }

    #[test]
    fn parses_character_arrays() {
        let grid =
            GridDataset::from_json(r#"[["w","m","b"],["x","w","w"]]"#, &small()).unwrap();
        assert_eq!(grid.code_at(CellCoord::new(1, 0)), Some('m'));
        assert_eq!(grid.code_at(CellCoord::new(0, 1)), Some('x'));
    }

    #[test]
    fn parses_string_rows() {
        let grid = GridDataset::from_json(r#"["wmb","xww"]"#, &small()).unwrap();
        assert_eq!(grid.code_at(CellCoord::new(2, 0)), Some('b'));
    }

    #[test]
    fn out_of_range_cells_have_no_code() {
        let grid = GridDataset::uniform(&small(), 'm');
        assert_eq!(grid.code_at(CellCoord::new(3, 0)), None);
        assert_eq!(grid.code_at(CellCoord::new(0, -1)), None);
    }

    #[test]
    fn rejects_wrong_row_count() {
        let err = GridDataset::from_json(r#"["wmb"]"#, &small()).unwrap_err();
        assert_eq!(err.to_string(), "Grid dataset is 3x1, expected 3x2");
    }

    #[test]
    fn rejects_ragged_rows() {
        let err = GridDataset::from_json(r#"["wmb","xw"]"#, &small()).unwrap_err();
        assert!(matches!(err, EngineError::GridDimensions { columns: 2, .. }));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = GridDataset::from_json(r#"{"rows":[]}"#, &small()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidGrid(_)));
    }
}
