use std::collections::BTreeMap;

pub const NO_ABSTRACT: &str = "No Abstract.";

/// Rebuild prose from an inverted index (word -> positions).
///
/// Words are emitted in ascending position order. Two words claiming the same
/// position keep the map's key order, so output is deterministic either way.
pub fn reconstruct_abstract(index: Option<&BTreeMap<String, Vec<usize>>>) -> String {
    let Some(index) = index else {
        return NO_ABSTRACT.to_string();
    };

    let mut words: Vec<(usize, &str)> = index
        .iter()
        .flat_map(|(word, positions)| positions.iter().map(move |&pos| (pos, word.as_str())))
        .collect();

    if words.is_empty() {
        return NO_ABSTRACT.to_string();
    }

    words.sort_by_key(|&(pos, _)| pos);

    words
        .into_iter()
        .map(|(_, word)| word)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(entries: &[(&str, &[usize])]) -> BTreeMap<String, Vec<usize>> {
        entries
            .iter()
            .map(|(w, p)| (w.to_string(), p.to_vec()))
            .collect()
    }

    #[test]
    fn orders_words_by_position() {
        let idx = index(&[("a", &[1]), ("fox", &[0])]);
        assert_eq!(reconstruct_abstract(Some(&idx)), "fox a");
    }

    #[test]
    fn repeated_words_appear_at_each_position() {
        let idx = index(&[("the", &[0, 3]), ("cat", &[1]), ("saw", &[2]), ("dog", &[4])]);
        assert_eq!(reconstruct_abstract(Some(&idx)), "the cat saw the dog");
    }

    #[test]
    fn empty_or_absent_yields_placeholder() {
        assert_eq!(reconstruct_abstract(None), NO_ABSTRACT);
        assert_eq!(reconstruct_abstract(Some(&BTreeMap::new())), NO_ABSTRACT);
        let no_positions = index(&[("orphan", &[])]);
        assert_eq!(reconstruct_abstract(Some(&no_positions)), NO_ABSTRACT);
    }

    #[test]
    fn position_ties_do_not_panic_and_are_deterministic() {
        let idx = index(&[("beta", &[0]), ("alpha", &[0]), ("end", &[1])]);
        let first = reconstruct_abstract(Some(&idx));
        assert_eq!(first, "alpha beta end");
        assert_eq!(reconstruct_abstract(Some(&idx)), first);
    }
}
