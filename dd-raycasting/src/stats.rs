use std::{
    collections::BTreeMap,
    fmt::Display,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Instant,
};

use lazy_static::lazy_static;

pub type StatsNode = Arc<Mutex<Stats>>;

lazy_static! {
    static ref ROOT_STATS: StatsNode = Arc::new(Mutex::new(Stats::new(1)));
}

/// A node of the hierarchical run statistics with accumulated timings and named counters.
pub struct Stats {
    /// The hierarchical depth of the stats node
    depth: usize,

    /// The node specific timings in nanoseconds
    timings_ns: u128,

    counters: BTreeMap<String, u64>,

    children: BTreeMap<String, StatsNode>,
}

/// Adds the elapsed time to its stats node when dropped.
pub struct TimeRecording {
    dst_node: StatsNode,
    t0: Instant,
}

pub trait StatsNodeTrait {
    /// Starts a time recording that ends when the returned guard is dropped.
    fn register_timing(&self) -> TimeRecording;

    /// Returns the child node with the given name, creating it if needed.
    fn get_child(&self, name: &str) -> StatsNode;

    /// Adds the given value to the counter with the given name.
    fn add_count(&self, name: &str, value: u64);

    /// Returns the current value of the counter with the given name.
    fn get_count(&self, name: &str) -> u64;
}

impl TimeRecording {
    pub fn new(dst_node: StatsNode) -> Self {
        let t0 = Instant::now();

        Self { dst_node, t0 }
    }
}

impl Drop for TimeRecording {
    #[inline]
    fn drop(&mut self) {
        let ns = self.t0.elapsed().as_nanos();
        lock(&self.dst_node).timings_ns += ns;
    }
}

/// Locks the node. A poisoned node still holds valid statistics, so the poisoning is ignored.
#[inline]
fn lock(node: &StatsNode) -> MutexGuard<'_, Stats> {
    node.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Stats {
    /// Returns the root stats node
    #[inline]
    pub fn root() -> StatsNode {
        ROOT_STATS.clone()
    }

    /// Returns a new detached root node, e.g., for collecting the statistics of a single run.
    pub fn new_root() -> StatsNode {
        Arc::new(Mutex::new(Stats::new(1)))
    }

    /// Returns a children time node for the given identifier.
    ///
    /// # Arguments
    /// * `name` - The name of the children time.
    #[inline]
    pub fn get_child(&mut self, name: String) -> StatsNode {
        let depth = self.depth + 1;
        self.children
            .entry(name)
            .or_insert_with(|| Arc::new(Mutex::new(Stats::new(depth))))
            .clone()
    }

    /// Returns the elapsed time of the node in nano-seconds
    #[inline]
    pub fn as_nanos(&self) -> u128 {
        self.timings_ns
    }

    /// Returns the elapsed time of the node in milli-seconds
    #[inline]
    pub fn as_millis(&self) -> u128 {
        self.timings_ns / 1000000u128
    }

    /// Returns the counter with the given name or zero if it has never been set.
    #[inline]
    pub fn count(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or_default()
    }

    fn new(depth: usize) -> Self {
        Self {
            depth,
            timings_ns: 0u128,
            counters: BTreeMap::new(),
            children: BTreeMap::new(),
        }
    }

    fn indent(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:width$}", "", width = self.depth * 2)
    }
}

impl Display for Stats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.children.is_empty() && self.counters.is_empty() {
            return writeln!(f, "{} ms,", self.as_millis());
        }

        if self.timings_ns == 0u128 {
            writeln!(f, "{{")?;
        } else {
            writeln!(f, "{} ms {{", self.as_millis())?;
        }

        for (name, value) in self.counters.iter() {
            self.indent(f)?;
            writeln!(f, "#{}: {},", name, value)?;
        }

        for (name, child) in self.children.iter() {
            self.indent(f)?;
            write!(f, "{}: ", name)?;
            lock(child).fmt(f)?;
        }

        writeln!(f, "}},")
    }
}

impl StatsNodeTrait for StatsNode {
    #[inline]
    fn register_timing(&self) -> TimeRecording {
        TimeRecording::new(self.clone())
    }

    #[inline]
    fn get_child(&self, name: &str) -> StatsNode {
        lock(self).get_child(name.to_owned())
    }

    #[inline]
    fn add_count(&self, name: &str, value: u64) {
        *lock(self).counters.entry(name.to_owned()).or_default() += value;
    }

    #[inline]
    fn get_count(&self, name: &str) -> u64 {
        lock(self).count(name)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_timings_and_counters() {
        let s = Stats::new_root();

        {
            let _t = s.get_child("firing").register_timing();
            std::thread::sleep(std::time::Duration::from_millis(2));
        }

        s.get_child("firing").add_count("misses", 3);
        s.get_child("firing").add_count("misses", 4);

        let firing = s.get_child("firing");
        assert!(firing.lock().unwrap().as_nanos() >= 2_000_000);
        assert_eq!(firing.get_count("misses"), 7);
        assert_eq!(firing.get_count("hits"), 0);

        let text = format!("{}", *s.lock().unwrap());
        assert!(text.contains("firing: "));
        assert!(text.contains("#misses: 7,"));
    }
}
