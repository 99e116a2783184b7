//! Number caller: draws without replacement from 1..=75

use super::types::{CalledNumber, MAX_NUMBER};
use crate::errors::GameError;
use rand::Rng;

#[derive(Debug, Clone)]
pub struct NumberCaller {
    pool: Vec<u8>,
    log: Vec<CalledNumber>,
}

impl Default for NumberCaller {
    fn default() -> Self {
        Self::new()
    }
}

impl NumberCaller {
    pub fn new() -> Self {
        Self {
            pool: (1..=MAX_NUMBER).collect(),
            log: Vec::with_capacity(MAX_NUMBER as usize),
        }
    }

    /// Draw a uniformly random number from the remaining pool
    pub fn call_next<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<CalledNumber, GameError> {
        if self.pool.is_empty() {
            return Err(GameError::PoolExhausted);
        }

        let index = rng.gen_range(0..self.pool.len());
        let number = self.pool.swap_remove(index);
        let called = CalledNumber::new(number).ok_or(GameError::NumberOutOfRange(number))?;
        self.log.push(called);
        Ok(called)
    }

    pub fn log(&self) -> &[CalledNumber] {
        &self.log
    }

    pub fn tokens(&self) -> Vec<String> {
        self.log.iter().map(CalledNumber::token).collect()
    }

    pub fn current(&self) -> Option<CalledNumber> {
        self.log.last().copied()
    }

    pub fn remaining(&self) -> usize {
        self.pool.len()
    }

    /// Exact numeric match against the log
    pub fn is_called(&self, number: u8) -> bool {
        self.log.iter().any(|c| c.number == number)
    }

    pub fn called_numbers(&self) -> impl Iterator<Item = u8> + '_ {
        self.log.iter().map(|c| c.number)
    }

    pub fn reset(&mut self) {
        self.pool = (1..=MAX_NUMBER).collect();
        self.log.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::types::Letter;
    use rand::{rngs::StdRng, SeedableRng};
    use std::collections::HashSet;

    #[test]
    fn test_full_sequence_has_no_repeats() {
        let mut rng = StdRng::seed_from_u64(75);
        let mut caller = NumberCaller::new();
        let mut seen = HashSet::new();

        for i in 0..75 {
            let called = caller.call_next(&mut rng).unwrap();
            assert!(seen.insert(called.token()));
            assert_eq!(Letter::for_number(called.number), Some(called.letter));
            assert_eq!(caller.log().len(), i + 1);
            assert_eq!(caller.log().len(), 75 - caller.remaining());
        }

        assert_eq!(caller.call_next(&mut rng), Err(GameError::PoolExhausted));
        assert_eq!(caller.log().len(), 75);
    }

    #[test]
    fn test_is_called_is_exact() {
        let mut caller = NumberCaller::new();
        caller.log.push(CalledNumber::new(12).unwrap());

        assert!(caller.is_called(12));
        assert!(!caller.is_called(1));
        assert!(!caller.is_called(2));
    }

    #[test]
    fn test_reset_refills_pool() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut caller = NumberCaller::new();
        for _ in 0..10 {
            caller.call_next(&mut rng).unwrap();
        }
        caller.reset();
        assert_eq!(caller.remaining(), 75);
        assert!(caller.log().is_empty());
        assert!(caller.current().is_none());
    }
}
