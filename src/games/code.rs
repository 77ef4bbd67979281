use rand::Rng;

/// Characters allowed in game codes. 0/O and 1/I are excluded so codes can be
/// read aloud without confusion.
const GAME_CODE_CHARS: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

pub const GAME_CODE_LEN: usize = 6;

pub fn generate_game_code() -> String {
    let mut rng = rand::thread_rng();
    (0..GAME_CODE_LEN)
        .map(|_| GAME_CODE_CHARS[rng.gen_range(0..GAME_CODE_CHARS.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_have_expected_length() {
        assert_eq!(generate_game_code().len(), GAME_CODE_LEN);
    }

    #[test]
    fn codes_use_only_unambiguous_characters() {
        for _ in 0..100 {
            let code = generate_game_code();
            for c in code.chars() {
                assert!(GAME_CODE_CHARS.contains(&(c as u8)), "unexpected char {c}");
                assert!(!"01OI".contains(c));
            }
        }
    }
}
