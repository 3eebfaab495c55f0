/*
 * dispatch.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Priority ordering shared by visitors, tag processors and transforms.
 */

/// An item with a priority and a registration sequence number.
#[derive(Debug, Clone)]
pub struct Prioritized<T> {
    pub priority: i32,
    pub sequence: u64,
    pub item: T,
}

/// A list kept in execution order: higher priority first, then earlier
/// registration first.
#[derive(Debug, Clone)]
pub struct PriorityList<T> {
    entries: Vec<Prioritized<T>>,
    next_sequence: u64,
}

impl<T> Default for PriorityList<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            next_sequence: 0,
        }
    }
}

impl<T> PriorityList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert with the next sequence number.
    pub fn push(&mut self, priority: i32, item: T) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.push_with_sequence(priority, sequence, item);
    }

    /// Insert with a sequence drawn from an external counter.
    pub fn push_with_sequence(&mut self, priority: i32, sequence: u64, item: T) {
        let entry = Prioritized {
            priority,
            sequence,
            item,
        };
        let idx = self
            .entries
            .partition_point(|e| execution_order(e, &entry) != std::cmp::Ordering::Greater);
        self.entries.insert(idx, entry);
        self.next_sequence = self.next_sequence.max(sequence + 1);
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|e| &e.item)
    }

    pub fn entries(&self) -> &[Prioritized<T>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn execution_order<T>(a: &Prioritized<T>, b: &Prioritized<T>) -> std::cmp::Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| a.sequence.cmp(&b.sequence))
}

/// Merge several prioritized sources into one execution order.
pub fn merge_by_priority<'a, T>(
    sources: impl IntoIterator<Item = &'a [Prioritized<T>]>,
) -> Vec<&'a Prioritized<T>>
where
    T: 'a,
{
    let mut merged: Vec<&Prioritized<T>> = sources.into_iter().flatten().collect();
    merged.sort_by(|a, b| execution_order(a, b));
    merged
}
