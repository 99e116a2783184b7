//! Player marks over called numbers

use super::caller::NumberCaller;
use super::types::MAX_NUMBER;
use crate::errors::GameError;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default)]
pub struct MarkSet {
    marks: BTreeSet<u8>,
}

impl MarkSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the mark on a called number and return whether it is now marked
    pub fn toggle(&mut self, number: u8, caller: &NumberCaller) -> Result<bool, GameError> {
        if number == 0 || number > MAX_NUMBER {
            return Err(GameError::NumberOutOfRange(number));
        }
        if !caller.is_called(number) {
            return Err(GameError::NumberNotCalled(number));
        }

        if self.marks.remove(&number) {
            Ok(false)
        } else {
            self.marks.insert(number);
            Ok(true)
        }
    }

    pub fn contains(&self, number: u8) -> bool {
        self.marks.contains(&number)
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.marks.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    pub fn clear(&mut self) {
        self.marks.clear();
    }
}
