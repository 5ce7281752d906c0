// Character-presence cosine similarity
//
// Messages are compared as unordered character sets: each string becomes a
// binary vector over the union of characters in both strings, and the
// similarity is the cosine of the two vectors. For binary vectors this reduces
// to |A ∩ B| / sqrt(|A| * |B|).

/// Sorted, deduplicated characters of a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharSet {
    chars: Vec<char>,
}

impl CharSet {
    pub fn new(text: &str) -> Self {
        let mut chars: Vec<char> = text.chars().collect();
        chars.sort_unstable();
        chars.dedup();
        Self { chars }
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Size of the intersection, computed by merging the two sorted sets
    fn intersection_len(&self, other: &CharSet) -> usize {
        let (mut i, mut j, mut shared) = (0, 0, 0);
        while i < self.chars.len() && j < other.chars.len() {
            match self.chars[i].cmp(&other.chars[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    shared += 1;
                    i += 1;
                    j += 1;
                }
            }
        }
        shared
    }

    /// Cosine similarity of the two presence vectors
    ///
    /// An empty set has a zero vector, so its similarity to any other set is 0.
    pub fn cosine(&self, other: &CharSet) -> f64 {
        if self.is_empty() || other.is_empty() {
            return if self == other { 1.0 } else { 0.0 };
        }
        let shared = self.intersection_len(other) as f64;
        shared / ((self.len() * other.len()) as f64).sqrt()
    }
}

/// Similarity of two raw messages
///
/// Identical strings score exactly 1.0, including two empty strings.
///
/// # Example
/// ```
/// use faultline::template::similarity;
///
/// assert_eq!(similarity("disk full", "disk full"), 1.0);
/// assert_eq!(similarity("abc", "cba"), 1.0);
/// assert_eq!(similarity("ab", "cd"), 0.0);
/// assert_eq!(similarity("ab", "bc"), similarity("bc", "ab"));
/// ```
pub fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    CharSet::new(a).cosine(&CharSet::new(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charset_dedups() {
        let set = CharSet::new("aabbcc");
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_similarity_half_overlap() {
        // {a,b} vs {b,c}: 1 / sqrt(2 * 2)
        assert!((similarity("ab", "bc") - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_similarity_ignores_order_and_multiplicity() {
        assert_eq!(similarity("disk full", "full disk"), 1.0);
        assert_eq!(similarity("aaab", "ab"), 1.0);
    }

    #[test]
    fn test_similarity_empty() {
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("", "abc"), 0.0);
        assert_eq!(similarity("abc", ""), 0.0);
    }

    #[test]
    fn test_similarity_unicode() {
        assert_eq!(similarity("磁盘已满", "已满磁盘"), 1.0);
        assert!(similarity("磁盘已满", "网络中断") < 0.8);
    }
}
