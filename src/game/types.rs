//! Bingo value types

use serde::{Deserialize, Serialize};
use std::{fmt, ops::RangeInclusive};

pub const MAX_NUMBER: u8 = 75;
pub const NUMBERS_PER_COLUMN: u8 = 15;
pub const GRID_SIZE: usize = 5;
pub const FREE_CELL: (usize, usize) = (2, 2);

/// Column letter; column `c` holds `15c+1 ..= 15c+15`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Letter {
    B,
    I,
    N,
    G,
    O,
}

impl Letter {
    pub const ALL: [Letter; 5] = [Letter::B, Letter::I, Letter::N, Letter::G, Letter::O];

    pub fn for_number(number: u8) -> Option<Letter> {
        match number {
            1..=15 => Some(Letter::B),
            16..=30 => Some(Letter::I),
            31..=45 => Some(Letter::N),
            46..=60 => Some(Letter::G),
            61..=75 => Some(Letter::O),
            _ => None,
        }
    }

    pub fn column(&self) -> usize {
        *self as usize
    }

    pub fn range(&self) -> RangeInclusive<u8> {
        let start = self.column() as u8 * NUMBERS_PER_COLUMN + 1;
        start..=start + NUMBERS_PER_COLUMN - 1
    }

    pub fn as_char(&self) -> char {
        match self {
            Letter::B => 'B',
            Letter::I => 'I',
            Letter::N => 'N',
            Letter::G => 'G',
            Letter::O => 'O',
        }
    }
}

/// A drawn number with its column letter, shown as `B-12`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CalledNumber {
    pub letter: Letter,
    pub number: u8,
}

impl CalledNumber {
    pub fn new(number: u8) -> Option<Self> {
        Letter::for_number(number).map(|letter| Self { letter, number })
    }

    pub fn token(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CalledNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.letter.as_char(), self.number)
    }
}
