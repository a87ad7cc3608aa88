/// Records partitioned by a lower-cased key, in first-occurrence order.
#[derive(Debug, Clone, PartialEq)]
pub struct Groups<T> {
    entries: Vec<(String, Vec<T>)>,
}

impl<T> Groups<T> {
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn get(&self, key: &str) -> Option<&[T]> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[T])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

impl<T> IntoIterator for Groups<T> {
    type Item = (String, Vec<T>);
    type IntoIter = std::vec::IntoIter<(String, Vec<T>)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

pub fn group_by_key<T, F>(records: impl IntoIterator<Item = T>, key_fn: F) -> Groups<T>
where
    F: Fn(&T) -> &str,
{
    let mut entries: Vec<(String, Vec<T>)> = Vec::new();
    for record in records {
        let key = key_fn(&record).to_lowercase();
        match entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, group)) => group.push(record),
            None => entries.push((key, vec![record])),
        }
    }
    Groups { entries }
}
