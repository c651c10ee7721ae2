//! Exam join codes.

use rand::Rng;

/// Characters used in generated codes. Excludes `I`, `O`, `0` and `1`, which
/// are easy to misread.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of the random suffix.
pub const CODE_SUFFIX_LEN: usize = 4;

/// Generate a join code of the form `EX-<year>-XXXX`.
pub fn generate_exam_code<R: Rng + ?Sized>(year: i32, rng: &mut R) -> String {
    let suffix: String = (0..CODE_SUFFIX_LEN)
        .map(|_| char::from(CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())]))
        .collect();
    format!("EX-{year}-{suffix}")
}

/// Normalize user input before a lookup. Only surrounding whitespace is
/// removed; codes are otherwise matched as typed.
pub fn normalize_code(input: &str) -> &str {
    input.trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn code_has_expected_shape() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let code = generate_exam_code(2026, &mut rng);
        assert!(code.starts_with("EX-2026-"), "got {code}");
        let suffix = &code["EX-2026-".len()..];
        assert_eq!(suffix.len(), CODE_SUFFIX_LEN);
        assert!(suffix.bytes().all(|b| CODE_ALPHABET.contains(&b)));
    }

    #[test]
    fn same_seed_same_code() {
        let a = generate_exam_code(2026, &mut ChaCha8Rng::seed_from_u64(1));
        let b = generate_exam_code(2026, &mut ChaCha8Rng::seed_from_u64(1));
        assert_eq!(a, b);
    }

    #[test]
    fn ambiguous_characters_never_appear() {
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        for _ in 0..200 {
            let code = generate_exam_code(2026, &mut rng);
            let suffix = &code[8..];
            assert!(!suffix.contains(['I', 'O', '0', '1']), "got {code}");
        }
    }

    #[test]
    fn normalize_trims_only() {
        assert_eq!(normalize_code("  ex-2026-abcd \n"), "ex-2026-abcd");
    }
}
