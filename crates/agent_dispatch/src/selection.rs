//! Per-agent FIFO queues with a round-robin cursor.
//!
//! The cursor always resumes at the agent after the one served last. Writes
//! take one slot; reads are drained in a sweep across agents whose heads are
//! also reads, so no item is ever taken out of its agent's order.

use std::collections::{BTreeMap, HashMap, VecDeque};

#[derive(Debug)]
pub(crate) struct AgentQueues<T> {
    queues: HashMap<String, VecDeque<T>>,
    rr_order: Vec<String>,
    rr_index: usize,
}

impl<T> Default for AgentQueues<T> {
    fn default() -> Self {
        Self {
            queues: HashMap::new(),
            rr_order: Vec::new(),
            rr_index: 0,
        }
    }
}

impl<T> AgentQueues<T> {
    /// Appends `item` to the agent's queue and returns the queue depth it saw.
    pub fn enqueue(&mut self, agent_id: &str, item: T) -> usize {
        if !self.queues.contains_key(agent_id) {
            self.rr_order.push(agent_id.to_string());
        }
        let queue = self.queues.entry(agent_id.to_string()).or_default();
        let position = queue.len();
        queue.push_back(item);
        position
    }

    pub fn queue_len(&self, agent_id: &str) -> usize {
        self.queues.get(agent_id).map(VecDeque::len).unwrap_or(0)
    }

    pub fn total_queued(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }

    pub fn active_agents(&self) -> usize {
        self.queues.values().filter(|queue| !queue.is_empty()).count()
    }

    pub fn depths(&self) -> BTreeMap<String, usize> {
        self.queues
            .iter()
            .filter(|(_, queue)| !queue.is_empty())
            .map(|(agent_id, queue)| (agent_id.clone(), queue.len()))
            .collect()
    }

    pub fn items(&self) -> impl Iterator<Item = &T> {
        self.queues.values().flat_map(|queue| queue.iter())
    }

    #[cfg(test)]
    pub fn rr_order(&self) -> &[String] {
        &self.rr_order
    }

    #[cfg(test)]
    pub fn rr_index(&self) -> usize {
        self.rr_index
    }

    /// Removes the next batch under the fairness policy. Empty when nothing is
    /// queued.
    pub fn select_batch<F>(&mut self, max_read_batch: usize, is_read: F) -> Vec<T>
    where
        F: Fn(&T) -> bool,
    {
        if self.rr_order.is_empty() {
            return Vec::new();
        }
        let len = self.rr_order.len();
        let start = self.rr_index % len;
        let Some(selected) = (0..len)
            .map(|offset| (start + offset) % len)
            .find(|&position| self.head(position).is_some())
        else {
            self.purge_empty();
            return Vec::new();
        };

        let mut batch = Vec::new();
        let head_is_read = self.head(selected).is_some_and(|head| is_read(head));
        if head_is_read {
            let limit = max_read_batch.max(1);
            let max_probes = len.saturating_mul(limit);
            // Start one before the selected agent so it is the first probe.
            let mut cursor = (selected + len - 1) % len;
            let mut probes = 0;
            while batch.len() < limit && probes < max_probes {
                cursor = (cursor + 1) % len;
                probes += 1;
                if self.head(cursor).is_some_and(|head| is_read(head)) {
                    if let Some(item) = self.pop_front_at(cursor) {
                        batch.push(item);
                    }
                }
            }
        } else if let Some(item) = self.pop_front_at(selected) {
            batch.push(item);
        }

        self.rr_index = (selected + 1) % len;
        self.purge_empty();
        batch
    }

    fn head(&self, position: usize) -> Option<&T> {
        self.rr_order
            .get(position)
            .and_then(|agent_id| self.queues.get(agent_id))
            .and_then(VecDeque::front)
    }

    fn pop_front_at(&mut self, position: usize) -> Option<T> {
        let agent_id = self.rr_order.get(position)?;
        self.queues.get_mut(agent_id)?.pop_front()
    }

    fn purge_empty(&mut self) {
        let rr_index = self.rr_index;
        let queues = &mut self.queues;
        let mut position = 0;
        let mut removed_before_cursor = 0;
        self.rr_order.retain(|agent_id| {
            let keep = queues.get(agent_id).is_some_and(|queue| !queue.is_empty());
            if !keep {
                queues.remove(agent_id);
                if position < rr_index {
                    removed_before_cursor += 1;
                }
            }
            position += 1;
            keep
        });
        self.rr_index = rr_index - removed_before_cursor;
        if self.rr_index >= self.rr_order.len() {
            self.rr_index = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Item {
        label: &'static str,
        read: bool,
    }

    fn read(label: &'static str) -> Item {
        Item { label, read: true }
    }

    fn write(label: &'static str) -> Item {
        Item { label, read: false }
    }

    fn take(queues: &mut AgentQueues<Item>, limit: usize) -> Vec<&'static str> {
        queues
            .select_batch(limit, |item| item.read)
            .into_iter()
            .map(|item| item.label)
            .collect()
    }

    #[test]
    fn enqueue_reports_position_at_submission() {
        let mut queues = AgentQueues::default();
        assert_eq!(queues.enqueue("a", write("a1")), 0);
        assert_eq!(queues.enqueue("a", write("a2")), 1);
        assert_eq!(queues.enqueue("b", write("b1")), 0);
        assert_eq!(queues.rr_order(), ["a".to_string(), "b".to_string()]);
        assert_eq!(queues.total_queued(), 3);
    }

    #[test]
    fn writes_alternate_between_agents() {
        let mut queues = AgentQueues::default();
        for (agent, label) in [
            ("a", "a1"),
            ("b", "b1"),
            ("a", "a2"),
            ("b", "b2"),
            ("a", "a3"),
            ("b", "b3"),
        ] {
            queues.enqueue(agent, write(label));
        }

        let mut order = Vec::new();
        for _ in 0..6 {
            let batch = take(&mut queues, 5);
            assert_eq!(batch.len(), 1);
            order.extend(batch);
        }
        assert_eq!(order, ["a1", "b1", "a2", "b2", "a3", "b3"]);
        assert!(take(&mut queues, 5).is_empty());
        assert!(queues.rr_order().is_empty());
    }

    #[test]
    fn reads_from_one_agent_drain_in_bounded_batches() {
        let labels = [
            "r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7", "r8", "r9", "r10", "r11",
        ];
        let mut queues = AgentQueues::default();
        for label in labels {
            queues.enqueue("a", read(label));
        }

        assert_eq!(take(&mut queues, 5), ["r0", "r1", "r2", "r3", "r4"]);
        assert_eq!(take(&mut queues, 5), ["r5", "r6", "r7", "r8", "r9"]);
        assert_eq!(take(&mut queues, 5), ["r10", "r11"]);
        assert!(take(&mut queues, 5).is_empty());
    }

    #[test]
    fn read_sweep_skips_agents_with_write_heads() {
        let mut queues = AgentQueues::default();
        queues.enqueue("a", read("a-r1"));
        queues.enqueue("a", read("a-r2"));
        queues.enqueue("b", write("b-w1"));
        queues.enqueue("b", read("b-r1"));
        queues.enqueue("c", read("c-r1"));

        assert_eq!(take(&mut queues, 5), ["a-r1", "c-r1", "a-r2"]);
        assert_eq!(queues.queue_len("b"), 2);
        assert_eq!(take(&mut queues, 5), ["b-w1"]);
        assert_eq!(take(&mut queues, 5), ["b-r1"]);
        assert_eq!(queues.total_queued(), 0);
    }

    #[test]
    fn write_head_is_served_alone_even_when_reads_wait() {
        let mut queues = AgentQueues::default();
        queues.enqueue("a", write("a-w1"));
        queues.enqueue("b", read("b-r1"));
        queues.enqueue("c", read("c-r1"));

        assert_eq!(take(&mut queues, 5), ["a-w1"]);
        assert_eq!(take(&mut queues, 5), ["b-r1", "c-r1"]);
    }

    #[test]
    fn purge_keeps_cursor_on_next_agent() {
        let mut queues = AgentQueues::default();
        queues.enqueue("a", write("a1"));
        queues.enqueue("b", write("b1"));
        queues.enqueue("b", write("b2"));
        queues.enqueue("c", write("c1"));

        assert_eq!(take(&mut queues, 5), ["a1"]);
        assert_eq!(queues.rr_order(), ["b".to_string(), "c".to_string()]);
        assert_eq!(queues.rr_index(), 0);
        assert_eq!(take(&mut queues, 5), ["b1"]);
        assert_eq!(take(&mut queues, 5), ["c1"]);
        assert_eq!(take(&mut queues, 5), ["b2"]);
    }

    #[test]
    fn late_joiner_is_visited_after_existing_agents() {
        let mut queues = AgentQueues::default();
        queues.enqueue("a", write("a1"));
        queues.enqueue("a", write("a2"));
        queues.enqueue("b", write("b1"));
        assert_eq!(take(&mut queues, 5), ["a1"]);

        queues.enqueue("c", write("c1"));
        assert_eq!(take(&mut queues, 5), ["b1"]);
        assert_eq!(take(&mut queues, 5), ["c1"]);
        assert_eq!(take(&mut queues, 5), ["a2"]);
    }
}
