//! Shannon entropy helpers, in bits.

/// Entropy of a probability distribution.  Zero probabilities contribute nothing.
pub fn entropy(probabilities: &[f64]) -> f64 {
    probabilities.iter()
        .filter(|p| **p > 0.)
        .map(|p| -p * p.log2())
        .sum()
}

/// Entropy of unnormalized frequencies.  A distribution without any mass has no uncertainty
/// to measure, so it reports zero.
pub fn entropy_frequencies(frequencies: &[f64]) -> f64 {
    let total = frequencies.iter().sum::<f64>();
    if !(total > 0.) {
        return 0.
    }
    let probabilities: Vec<_> = frequencies.iter().map(|f| f / total).collect();
    entropy(&probabilities)
}

pub fn entropy_counts(counts: &[u64]) -> f64 {
    let frequencies: Vec<_> = counts.iter().map(|c| *c as f64).collect();
    entropy_frequencies(&frequencies)
}

/// Character entropy of a string, case insensitive, counting only ASCII digits and letters.
pub fn entropy_str(input: &str) -> f64 {
    let mut counts = [0u64; 36];
    for c in input.chars().map(|c| c.to_ascii_lowercase()) {
        match c {
            '0'..='9' => counts[c as usize - '0' as usize] += 1,
            'a'..='z' => counts[c as usize - 'a' as usize + 10] += 1,
            _ => {}
        }
    }
    entropy_counts(&counts)
}
