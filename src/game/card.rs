//! Card generation and win detection

use super::types::{Letter, FREE_CELL, GRID_SIZE, MAX_NUMBER};
use crate::errors::ValidationError;
use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Row-major 5×5 grid; `None` is the free centre
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BingoCard {
    grid: [[Option<u8>; GRID_SIZE]; GRID_SIZE],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "index")]
pub enum WinningLine {
    Row(usize),
    Column(usize),
    Diagonal,
    AntiDiagonal,
}

/// Shuffle each column's fifteen numbers and keep the first five
pub fn generate_card<R: Rng + ?Sized>(rng: &mut R) -> BingoCard {
    let mut grid = [[None; GRID_SIZE]; GRID_SIZE];

    for letter in Letter::ALL {
        let mut pool: Vec<u8> = letter.range().collect();
        pool.shuffle(rng);
        for (row, number) in pool.into_iter().take(GRID_SIZE).enumerate() {
            grid[row][letter.column()] = Some(number);
        }
    }

    grid[FREE_CELL.0][FREE_CELL.1] = None;
    BingoCard { grid }
}

impl BingoCard {
    /// Validate a stored grid
    pub fn from_grid(grid: [[Option<u8>; GRID_SIZE]; GRID_SIZE]) -> Result<Self, ValidationError> {
        for (row, cells) in grid.iter().enumerate() {
            for (col, cell) in cells.iter().enumerate() {
                match (cell, (row, col) == FREE_CELL) {
                    (None, true) => {}
                    (Some(_), true) => {
                        return Err(ValidationError::invalid("card_data", "centre must be free"))
                    }
                    (None, false) => {
                        return Err(ValidationError::invalid(
                            "card_data",
                            format!("cell ({}, {}) is empty", row, col),
                        ))
                    }
                    (Some(n), false) => {
                        if Letter::for_number(*n).map(|l| l.column()) != Some(col) {
                            return Err(ValidationError::invalid(
                                "card_data",
                                format!("{} does not belong in column {}", n, col),
                            ));
                        }
                    }
                }
            }
        }

        let card = BingoCard { grid };
        let numbers = card.numbers();
        let unique: HashSet<u8> = numbers.iter().copied().collect();
        if unique.len() != numbers.len() {
            return Err(ValidationError::invalid("card_data", "duplicate numbers"));
        }
        Ok(card)
    }

    pub fn grid(&self) -> &[[Option<u8>; GRID_SIZE]; GRID_SIZE] {
        &self.grid
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<u8> {
        self.grid.get(row).and_then(|r| r.get(col)).copied().flatten()
    }

    /// The 24 numbers on the card, row-major
    pub fn numbers(&self) -> Vec<u8> {
        self.grid.iter().flatten().filter_map(|c| *c).collect()
    }

    pub fn column(&self, col: usize) -> Vec<u8> {
        self.grid.iter().filter_map(|row| row[col]).collect()
    }

    pub fn contains(&self, number: u8) -> bool {
        self.grid.iter().flatten().any(|c| *c == Some(number))
    }

    pub fn column_of(number: u8) -> Option<Letter> {
        if number == 0 || number > MAX_NUMBER {
            return None;
        }
        Letter::for_number(number)
    }

    /// Free centre always counts as matched
    pub fn is_matched(&self, row: usize, col: usize, marked: &HashSet<u8>) -> bool {
        match self.cell(row, col) {
            None => (row, col) == FREE_CELL,
            Some(n) => marked.contains(&n),
        }
    }

    /// Card numbers present in `called`
    pub fn matched_numbers(&self, called: &HashSet<u8>) -> usize {
        self.numbers().iter().filter(|n| called.contains(n)).count()
    }

    pub fn winning_lines(&self, called: &HashSet<u8>) -> Vec<WinningLine> {
        let hit = |row: usize, col: usize| self.is_matched(row, col, called);
        let mut lines = Vec::new();

        for i in 0..GRID_SIZE {
            if (0..GRID_SIZE).all(|c| hit(i, c)) {
                lines.push(WinningLine::Row(i));
            }
            if (0..GRID_SIZE).all(|r| hit(r, i)) {
                lines.push(WinningLine::Column(i));
            }
        }
        if (0..GRID_SIZE).all(|i| hit(i, i)) {
            lines.push(WinningLine::Diagonal);
        }
        if (0..GRID_SIZE).all(|i| hit(i, GRID_SIZE - 1 - i)) {
            lines.push(WinningLine::AntiDiagonal);
        }

        lines
    }

    pub fn has_bingo(&self, called: &HashSet<u8>) -> bool {
        !self.winning_lines(called).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_generated_cards_respect_columns() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..500 {
            let card = generate_card(&mut rng);
            assert_eq!(card.cell(2, 2), None);

            for letter in Letter::ALL {
                let column = card.column(letter.column());
                let expected = if letter == Letter::N { 4 } else { 5 };
                assert_eq!(column.len(), expected);

                let unique: HashSet<u8> = column.iter().copied().collect();
                assert_eq!(unique.len(), column.len());
                assert!(column.iter().all(|n| letter.range().contains(n)));
            }
            assert!(BingoCard::from_grid(*card.grid()).is_ok());
        }
    }

    #[test]
    fn test_seeded_generation_is_reproducible() {
        let a = generate_card(&mut StdRng::seed_from_u64(9));
        let b = generate_card(&mut StdRng::seed_from_u64(9));
        assert_eq!(a, b);
    }

    #[test]
    fn test_row_bingo_with_free_centre() {
        let card = generate_card(&mut StdRng::seed_from_u64(3));
        let middle_row: HashSet<u8> = (0..5).filter_map(|c| card.cell(2, c)).collect();
        assert_eq!(middle_row.len(), 4);

        assert_eq!(card.winning_lines(&middle_row), vec![WinningLine::Row(2)]);
        assert!(card.has_bingo(&middle_row));

        let mut partial = middle_row.clone();
        let first = card.cell(2, 0).unwrap();
        partial.remove(&first);
        assert!(!card.has_bingo(&partial));
    }

    #[test]
    fn test_diagonal_bingo() {
        let card = generate_card(&mut StdRng::seed_from_u64(11));
        let diagonal: HashSet<u8> = (0..5).filter_map(|i| card.cell(i, i)).collect();
        assert!(card.winning_lines(&diagonal).contains(&WinningLine::Diagonal));
        assert_eq!(card.matched_numbers(&diagonal), 4);
    }

    #[test]
    fn test_from_grid_rejects_bad_cards() {
        let card = generate_card(&mut StdRng::seed_from_u64(5));
        let mut grid = *card.grid();
        grid[2][2] = Some(40);
        assert!(BingoCard::from_grid(grid).is_err());

        let mut grid = *card.grid();
        grid[0][0] = Some(70);
        assert!(BingoCard::from_grid(grid).is_err());

        let mut grid = *card.grid();
        grid[1][0] = grid[0][0];
        assert!(BingoCard::from_grid(grid).is_err());
    }
}
