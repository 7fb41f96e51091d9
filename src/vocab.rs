use std::borrow::Cow;
use std::collections::HashMap;

/// A token: a run of non-whitespace bytes, usually but not necessarily UTF-8.
pub type Word = Vec<u8>;

pub type WordCount = HashMap<Word, u64>;

// merged counts of every chunk, read-only once built
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vocabulary {
    counts: WordCount,
}

impl Vocabulary {
    pub(crate) fn new(counts: WordCount) -> Self {
        Self { counts }
    }

    pub fn get(&self, word: &[u8]) -> Option<u64> {
        self.counts.get(word).copied()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn counts(&self) -> &WordCount {
        &self.counts
    }

    pub fn rank(&self) -> RankedVocabulary {
        rank(&self.counts)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedEntry {
    pub word: Word,
    pub count: u64,
}

impl RankedEntry {
    /// The word as text, with invalid UTF-8 replaced. For display only:
    /// distinct words can map to the same text.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.word)
    }

    /// The word as text that maps back to exactly one byte sequence: a
    /// backslash becomes `\\` and each byte of invalid UTF-8 becomes `\xNN`.
    /// Valid UTF-8 without backslashes is returned as is.
    pub fn escaped(&self) -> Cow<'_, str> {
        if let Ok(text) = std::str::from_utf8(&self.word) {
            if !text.contains('\\') {
                return Cow::Borrowed(text);
            }
        }

        let mut out = String::with_capacity(self.word.len() + 8);
        for chunk in self.word.utf8_chunks() {
            for c in chunk.valid().chars() {
                if c == '\\' {
                    out.push_str("\\\\");
                } else {
                    out.push(c);
                }
            }
            for b in chunk.invalid() {
                out.push_str(&format!("\\x{b:02x}"));
            }
        }
        Cow::Owned(out)
    }
}

/// Words ordered by descending count. Equal counts are ordered by ascending
/// byte-wise word order so the ranking is reproducible run to run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RankedVocabulary {
    entries: Vec<RankedEntry>,
}

/// Ranks every entry of `counts` without touching it.
pub fn rank(counts: &WordCount) -> RankedVocabulary {
    let entries = counts
        .iter()
        .map(|(word, &count)| RankedEntry {
            word: word.clone(),
            count,
        })
        .collect();
    RankedVocabulary::from_entries(entries)
}

impl RankedVocabulary {
    /// Orders arbitrary entries. Ranking an already ranked sequence is a no-op.
    pub fn from_entries(mut entries: Vec<RankedEntry>) -> Self {
        entries.sort_unstable_by(|a, b| b.count.cmp(&a.count).then_with(|| a.word.cmp(&b.word)));
        Self { entries }
    }

    pub fn entries(&self) -> &[RankedEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RankedEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn head(&self, k: usize) -> &[RankedEntry] {
        &self.entries[..k.min(self.entries.len())]
    }

    pub fn into_entries(self) -> Vec<RankedEntry> {
        self.entries
    }

    /// The leading entries with at least `min_count` occurrences, at most
    /// `max_vocab` of them.
    pub fn kept(
        &self,
        max_vocab: Option<usize>,
        min_count: u64,
    ) -> impl Iterator<Item = &RankedEntry> + '_ {
        self.entries
            .iter()
            .take_while(move |e| e.count >= min_count)
            .take(max_vocab.unwrap_or(usize::MAX))
    }

    /// Word -> id map for the downstream stages, ids being ranks (0 = most
    /// frequent). Words below `min_count` are dropped and at most `max_vocab`
    /// words are kept.
    pub fn word_ids(&self, max_vocab: Option<usize>, min_count: u64) -> HashMap<Word, usize> {
        self.kept(max_vocab, min_count)
            .enumerate()
            .map(|(i, e)| (e.word.clone(), i))
            .collect()
    }

    pub fn log_head(&self, k: usize) {
        log::info!("vocabulary head:");
        for entry in self.head(k) {
            log::info!("\t{} - {}", entry.text(), entry.count);
        }
        log::info!("vocab size: {}", self.len());
    }
}

impl<'a> IntoIterator for &'a RankedVocabulary {
    type Item = &'a RankedEntry;
    type IntoIter = std::slice::Iter<'a, RankedEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    fn counts(pairs: &[(&str, u64)]) -> WordCount {
        pairs.iter().map(|(w, c)| (w.as_bytes().to_vec(), *c)).collect()
    }

    fn words(ranked: &RankedVocabulary) -> Vec<String> {
        ranked.iter().map(|e| e.text().into_owned()).collect()
    }

    #[test]
    fn ranks_by_count_then_word() {
        let input = counts(&[("you", 4), ("are", 3), ("a", 2), ("pro", 1), ("fun", 1), ("or", 1)]);
        let ranked = rank(&input);

        assert_eq!(ranked.len(), input.len());
        assert_eq!(words(&ranked), ["you", "are", "a", "fun", "or", "pro"]);
        let sorted = ranked.entries().windows(2).all(|w| w[0].count >= w[1].count);
        assert!(sorted);
    }

    #[test]
    fn rank_does_not_touch_input() {
        let input = counts(&[("x", 1), ("y", 2)]);
        let before = input.clone();
        let _ = rank(&input);
        assert_eq!(input, before);
    }

    #[test]
    fn reranking_is_stable() {
        let ranked = rank(&counts(&[("b", 2), ("a", 2), ("c", 5), ("d", 1)]));
        let again = RankedVocabulary::from_entries(ranked.clone().into_entries());
        assert_eq!(again, ranked);

        let mut reversed = ranked.clone().into_entries();
        reversed.reverse();
        assert_eq!(RankedVocabulary::from_entries(reversed), ranked);
    }

    #[test]
    fn word_ids_follow_rank() {
        let ranked = rank(&counts(&[("the", 9), ("of", 7), ("cat", 2), ("zebra", 1)]));

        let all = ranked.word_ids(None, 1);
        assert_eq!(all.len(), 4);
        assert_eq!(all[b"the".as_slice()], 0);
        assert_eq!(all[b"zebra".as_slice()], 3);

        let capped = ranked.word_ids(Some(2), 1);
        assert_eq!(capped.len(), 2);
        assert!(!capped.contains_key(b"cat".as_slice()));

        let frequent = ranked.word_ids(None, 2);
        assert_eq!(frequent.len(), 3);
        assert!(!frequent.contains_key(b"zebra".as_slice()));
    }

    #[test]
    fn escaping_keeps_words_apart() {
        let entry = |w: &[u8]| RankedEntry { word: w.to_vec(), count: 1 };

        assert!(matches!(entry(b"caf\xc3\xa9").escaped(), Cow::Borrowed("caf\u{e9}")));
        assert_eq!(entry(b"\xff").escaped(), "\\xff");
        assert_eq!(entry(b"\xfe").escaped(), "\\xfe");
        // a literal backslash-x-f-f is not the 0xff byte
        assert_eq!(entry(b"\\xff").escaped(), "\\\\xff");
        assert_eq!(entry(b"a\xffb\xc3\xa9").escaped(), "a\\xffb\u{e9}");
    }

    #[test]
    fn vocabulary_totals() {
        let vocab = Vocabulary::new(counts(&[("a", 3), ("b", 4)]));
        assert_eq!(vocab.len(), 2);
        assert_eq!(vocab.total(), 7);
        assert_eq!(vocab.get(b"a"), Some(3));
        assert_eq!(vocab.get(b"c"), None);
        assert_eq!(vocab.rank().head(1)[0].count, 4);
        assert!(Vocabulary::default().rank().is_empty());
    }
}
