use serde::{Deserialize, Deserializer, Serialize};

/// Load of one pool member as last computed by the leader.
///
/// A non-finite load is stored as JSON `null` and read back as `+inf`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadEntry {
    pub id: String,
    #[serde(deserialize_with = "deserialize_load")]
    pub load: f64,
}

impl LoadEntry {
    pub fn new(id: impl Into<String>, load: f64) -> Self {
        LoadEntry {
            id: id.into(),
            load,
        }
    }
}

fn deserialize_load<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
}

/// Ordered view of every member's load, replaced wholesale on each refresh.
///
/// Entry order matters: it breaks ties in [`LoadSnapshot::idle`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoadSnapshot {
    entries: Vec<LoadEntry>,
}

impl LoadSnapshot {
    pub fn new(entries: Vec<LoadEntry>) -> Self {
        LoadSnapshot { entries }
    }

    /// Parses the stored form. Callers decide what an unparseable blob means.
    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn entries(&self) -> &[LoadEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.id.as_str())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids().any(|entry_id| entry_id == id)
    }

    /// Load recorded for `id`, or `+inf` when the snapshot does not know it.
    pub fn load_of(&self, id: &str) -> f64 {
        self.entries
            .iter()
            .find(|entry| entry.id == id)
            .map_or(f64::INFINITY, |entry| entry.load)
    }

    /// The lexicographically smallest id, i.e. the current leader.
    pub fn leader(&self) -> Option<&str> {
        self.ids().min()
    }

    /// Id with the lowest load; the first entry wins among equal loads.
    pub fn idle(&self) -> Option<&str> {
        self.entries
            .iter()
            .fold(None, |best: Option<&LoadEntry>, entry| match best {
                Some(current) if current.load.total_cmp(&entry.load).is_le() => Some(current),
                _ => Some(entry),
            })
            .map(|entry| entry.id.as_str())
    }

    /// Ids from `expected` that have no entry here.
    pub fn missing_ids(&self, expected: &[String]) -> Vec<String> {
        expected
            .iter()
            .filter(|id| !self.contains(id))
            .cloned()
            .collect()
    }
}

impl From<Vec<LoadEntry>> for LoadSnapshot {
    fn from(entries: Vec<LoadEntry>) -> Self {
        LoadSnapshot::new(entries)
    }
}

impl FromIterator<LoadEntry> for LoadSnapshot {
    fn from_iter<I: IntoIterator<Item = LoadEntry>>(iter: I) -> Self {
        LoadSnapshot::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(entries: &[(&str, f64)]) -> LoadSnapshot {
        entries
            .iter()
            .map(|(id, load)| LoadEntry::new(*id, *load))
            .collect()
    }

    #[test]
    fn idle_picks_strict_minimum() {
        let snap = snapshot(&[("a", 30.0), ("b", 5.0), ("c", 12.0)]);
        assert_eq!(snap.idle(), Some("b"));
    }

    #[test]
    fn idle_tie_goes_to_first_entry() {
        let snap = snapshot(&[("c", 7.0), ("a", 3.0), ("b", 3.0), ("d", 3.0)]);

        assert_eq!(snap.idle(), Some("a"));
        // same input, same answer
        assert_eq!(snap.clone().idle(), Some("a"));
    }

    #[test]
    fn idle_prefers_any_finite_load_over_unknown() {
        let snap = snapshot(&[("a", f64::INFINITY), ("b", 999.0)]);
        assert_eq!(snap.idle(), Some("b"));
    }

    #[test]
    fn empty_snapshot_has_no_idle_and_no_leader() {
        let snap = LoadSnapshot::default();

        assert_eq!(snap.idle(), None);
        assert_eq!(snap.leader(), None);
    }

    #[test]
    fn leader_is_smallest_id_regardless_of_order() {
        let snap = snapshot(&[("b2", 1.0), ("a9", 50.0), ("b1", 0.0)]);
        assert_eq!(snap.leader(), Some("a9"));
    }

    #[test]
    fn unknown_member_load_is_infinite() {
        let snap = snapshot(&[("a", 4.0)]);

        assert_eq!(snap.load_of("a"), 4.0);
        assert_eq!(snap.load_of("zzz"), f64::INFINITY);
    }

    #[test]
    fn stored_form_is_an_array_of_id_load_records() {
        let snap = snapshot(&[("a", 1.0), ("b", 2.5)]);
        let json = snap.to_json().unwrap();

        assert_eq!(json, r#"[{"id":"a","load":1.0},{"id":"b","load":2.5}]"#);
        assert_eq!(LoadSnapshot::from_json(&json).unwrap(), snap);
    }

    #[test]
    fn integer_loads_and_null_loads_parse() {
        let snap = LoadSnapshot::from_json(r#"[{"id":"a","load":1000},{"id":"b","load":null}]"#)
            .unwrap();

        assert_eq!(snap.load_of("a"), 1000.0);
        assert_eq!(snap.load_of("b"), f64::INFINITY);
    }

    #[test]
    fn missing_ids_reports_uncovered_members() {
        let snap = snapshot(&[("a", 1.0)]);
        let expected = vec!["a".to_string(), "b".to_string()];

        assert_eq!(snap.missing_ids(&expected), vec!["b".to_string()]);
    }
}
