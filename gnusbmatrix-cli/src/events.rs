use std::fmt;

use gnusbmatrix_core::{led_mask, COLUMNS, ROWS};

/// One change seen between two LED snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A single LED changed.
    Button { column: usize, row: usize, lit: bool },
    /// A column byte changed; carries the whole column.
    Column { column: usize, rows: [bool; ROWS] },
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Button { column, row, lit } => {
                write!(f, "button {column} {row} {}", u8::from(*lit))
            }
            Event::Column { column, rows } => {
                write!(f, "column {column}")?;
                for lit in rows {
                    write!(f, " {}", u8::from(*lit))?;
                }
                Ok(())
            }
        }
    }
}

/// Unpack a column byte into per-row flags.
pub fn column_rows(byte: u8) -> [bool; ROWS] {
    let mut rows = [false; ROWS];
    for (row, lit) in rows.iter_mut().enumerate() {
        *lit = byte & led_mask(row) != 0;
    }
    rows
}

/// Compare two snapshots column by column. For every column that differs,
/// one `Button` event per changed bit is followed by a `Column` event.
pub fn diff(prev: &[u8; COLUMNS], cur: &[u8; COLUMNS]) -> Vec<Event> {
    let mut events = Vec::new();
    for (column, (&old, &new)) in prev.iter().zip(cur.iter()).enumerate() {
        let changed = old ^ new;
        if changed == 0 {
            continue;
        }
        for row in 0..ROWS {
            if changed & led_mask(row) != 0 {
                events.push(Event::Button {
                    column,
                    row,
                    lit: new & led_mask(row) != 0,
                });
            }
        }
        events.push(Event::Column {
            column,
            rows: column_rows(new),
        });
    }
    events
}
