//! Gap detection across recorded number sequences.
//!
//! Runs once per batch, after every document has been processed. For
//! each year the numbers between the recorded minimum and maximum are
//! expected to be contiguous; anything missing and not already flagged
//! gets one GAP message. Re-running never duplicates a flag.

use std::collections::HashSet;

use tracing::info;

use super::Result;
use crate::models::{Message, MessageKind};
use crate::repository::{MessageRepository, RecordRepository};

/// Infers missing record numbers per year.
pub struct GapDetector<'a> {
    records: &'a RecordRepository,
    messages: &'a MessageRepository,
}

impl<'a> GapDetector<'a> {
    pub fn new(records: &'a RecordRepository, messages: &'a MessageRepository) -> Self {
        Self { records, messages }
    }

    /// Flag newly missing numbers; returns how many GAP messages were
    /// created.
    pub fn run(&self) -> Result<usize> {
        let mut created = 0;
        for year in self.records.years()? {
            let numbers = self.records.numbers_for_year(year)?;
            let (Some(min), Some(max)) = (numbers.first(), numbers.last()) else {
                continue;
            };

            let recorded: HashSet<i64> = numbers.iter().copied().collect();
            let flagged = self.messages.active_gap_numbers(year)?;

            for number in *min..=*max {
                if recorded.contains(&number) || flagged.contains(&number) {
                    continue;
                }
                self.messages
                    .insert(MessageKind::Gap, &Message::gap_text(number, year))?;
                info!("flagged gap: record {number}/{year} missing");
                created += 1;
            }
        }
        Ok(created)
    }
}
